//! # Support of the CCSDS Unified Space Data Link Protocol (USLP)
//!
//! A transfer frame consists of the following regions, in this order:
//!
//! 1. [PrimaryHeader], 7 octets plus the virtual channel frame count.
//! 2. Insert zone, opaque and of mission-fixed length which may be zero.
//! 3. [DataField]: security header, [DataFieldHeader], data zone and security trailer.
//! 4. Operational control field, present if the OCF flag of the primary header is set.
//! 5. Frame error control field, present if the mission enables it.
//!
//! The [FrameCodec] binds a [MissionConfig] and assembles and slices complete frames.
//!
//! ## Example
//!
//! ```rust
//! use spacelink::uslp::{
//!     ConstructionRule, DataField, DataFieldHeader, FrameCodec, FrameParams, MissionConfig,
//!     SecurityHeader, SecurityTrailer, UslpProtocolId,
//! };
//!
//! let codec = FrameCodec::new(MissionConfig::new(0x2A)).unwrap();
//! let data_field = DataField::new(
//!     SecurityHeader::default(),
//!     DataFieldHeader::new(
//!         ConstructionRule::NoSegmentation,
//!         UslpProtocolId::UserDefinedOctetStream,
//!         None,
//!     )
//!     .unwrap(),
//!     &[1, 2, 3, 4],
//!     SecurityTrailer::default(),
//! );
//! let frame = codec.build_frame(&FrameParams::new(1), data_field, None).unwrap();
//! let raw = codec.encode(&frame).unwrap();
//! assert_eq!(raw.len(), frame.primary_header.len_frame());
//! assert_eq!(codec.decode(&raw).unwrap(), frame);
//! ```
#![deny(missing_docs)]
use crate::bits::BitFieldError;
use crate::{ByteConversionError, FieldOverflowError};

pub mod config;
pub mod data_field;
pub mod frame;
pub mod header;
pub mod regions;

pub use config::{FrameCountWidth, MissionConfig, SpareCheck};
pub use data_field::{DataField, DataFieldHeader, SecurityHeader, SecurityTrailer};
pub use frame::{FrameCodec, FrameParams, TransferFrame};
pub use header::PrimaryHeader;
pub use regions::{
    Crc32Fecf, FecfCalculator, FrameErrorControlField, InsertZone, OperationalControlField,
};

/// Version number of USLP transfer frames, CCSDS 732.1-B-2.
pub const USLP_VERSION_NUMBER: u8 = 0b1100;

/// Identifies the association of the data contained in the transfer frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SourceOrDestField {
    /// SCID refers to the source of the transfer frame.
    Source = 0,
    /// SCID refers to the destination of the transfer frame.
    Dest = 1,
}

impl From<bool> for SourceOrDestField {
    fn from(bit: bool) -> Self {
        if bit {
            SourceOrDestField::Dest
        } else {
            SourceOrDestField::Source
        }
    }
}

/// Bypass sequence control flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BypassSequenceControlFlag {
    /// Acceptance of this frame on the receiving end is subject to normal frame acceptance
    /// checks of FARM.
    SequenceControlledQoS = 0,
    /// Frame Acceptance Checks of FARM by the receiving end shall be bypassed.
    ExpeditedQoS = 1,
}

impl From<bool> for BypassSequenceControlFlag {
    fn from(bit: bool) -> Self {
        if bit {
            BypassSequenceControlFlag::ExpeditedQoS
        } else {
            BypassSequenceControlFlag::SequenceControlledQoS
        }
    }
}

/// Protocol Control Command Flag.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ProtocolControlCommandFlag {
    /// Transfer frame data field contains user data.
    TfdfContainsUserData = 0,
    /// Transfer frame data field contains protocol information.
    TfdfContainsProtocolInfo = 1,
}

impl From<bool> for ProtocolControlCommandFlag {
    fn from(bit: bool) -> Self {
        if bit {
            ProtocolControlCommandFlag::TfdfContainsProtocolInfo
        } else {
            ProtocolControlCommandFlag::TfdfContainsUserData
        }
    }
}

/// Assigned USLP protocol IDs.
///
/// The data field header carries the raw 5-bit value, so IDs outside this list still decode.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[non_exhaustive]
pub enum UslpProtocolId {
    /// Space packets or encapsulation packets.
    SpacePacketsOrEncapsulation = 0b00000,
    /// COP-1 control commands within the TFDZ.
    Cop1ControlCommands = 0b00001,
    /// COP-P control commands within the TFDZ.
    CopPControlCommands = 0b00010,
    /// SDLS control commands within the TFDZ.
    Sdls = 0b00011,
    /// User defined octet stream.
    UserDefinedOctetStream = 0b00100,
    /// Proximity-1 Supervisory Protocol Data Units (SPDUs) within the TFDZ.
    Spdu = 0b00111,
    /// Entire fixed-length TFDZ contains idle data.
    Idle = 0b11111,
}

/// USLP construction rule enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConstructionRule {
    /// Indicated fixed-length TFDZ whose contents are CCSDS packets concatenated together, which
    /// span transfer frame boundaries. The First Header Pointer (FHP) is required for packet
    /// extraction.
    PacketSpanningMultipleFrames = 0b000,
    /// Start of a MAPA SDU or VCA SDU.
    StartOfMapaSduOrVcaSdu = 0b001,
    /// Continuing portion of a MAPA SDU.
    ContinuingPortionOfMapaSdu = 0b010,
    /// Octet stream.
    OctetStream = 0b011,
    /// Starting segment.
    StartingSegment = 0b100,
    /// Continuing segment.
    ContinuingSegment = 0b101,
    /// Last segment.
    LastSegment = 0b110,
    /// No segmentation.
    NoSegmentation = 0b111,
}

impl ConstructionRule {
    /// Decode the three bit construction rule field. Only the lowest three bits are considered.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => ConstructionRule::PacketSpanningMultipleFrames,
            0b001 => ConstructionRule::StartOfMapaSduOrVcaSdu,
            0b010 => ConstructionRule::ContinuingPortionOfMapaSdu,
            0b011 => ConstructionRule::OctetStream,
            0b100 => ConstructionRule::StartingSegment,
            0b101 => ConstructionRule::ContinuingSegment,
            0b110 => ConstructionRule::LastSegment,
            _ => ConstructionRule::NoSegmentation,
        }
    }

    /// Is the construction rule applicable to fixed-length TFDZs? Only those carry the first
    /// header or last valid octet pointer.
    #[inline]
    pub const fn applicable_to_fixed_len_tfdz(&self) -> bool {
        match self {
            ConstructionRule::PacketSpanningMultipleFrames => true,
            ConstructionRule::StartOfMapaSduOrVcaSdu => true,
            ConstructionRule::ContinuingPortionOfMapaSdu => true,
            ConstructionRule::OctetStream => false,
            ConstructionRule::StartingSegment => false,
            ConstructionRule::ContinuingSegment => false,
            ConstructionRule::LastSegment => false,
            ConstructionRule::NoSegmentation => false,
        }
    }
}

/// Caller or configuration requested a frame layout which contradicts the frame flags or the
/// mission configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// OCF bytes were supplied while the OCF flag is cleared.
    #[error("operational control field supplied but OCF flag is not set")]
    OcfWithoutFlag,
    /// The OCF flag is set but no OCF bytes were supplied.
    #[error("OCF flag is set but no operational control field was supplied")]
    OcfFlagWithoutOcf,
    /// FECF bytes were supplied while the mission disables the FECF.
    #[error("frame error control field supplied but FECF is disabled")]
    FecfWhileDisabled,
    /// The mission enables the FECF but neither FECF bytes nor a calculator were supplied.
    #[error("FECF is enabled but no frame error control field was supplied")]
    MissingFecf,
    /// The insert zone does not have the mission-configured length.
    #[error("insert zone has length {found}, mission configures {expected}")]
    InsertZoneLength {
        /// Actual length.
        found: usize,
        /// Configured length.
        expected: usize,
    },
    /// The fixed frame count width must be between 1 and 8 octets.
    #[error("invalid fixed frame count width of {0} octets")]
    InvalidFrameCountWidth(u8),
    /// A configured field value exceeds its width.
    #[error("configured {field} value {value} exceeds {width} bits")]
    FieldTooWide {
        /// Name of the configured field.
        field: &'static str,
        /// Configured value.
        value: u64,
        /// Field width in bits.
        width: usize,
    },
}

/// FHP or LVO field is not valid for the given construction rule.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("FHP or LVO field invalid for given construction rule")]
pub struct FhpLvoError(pub ConstructionRule);

/// USLP error enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UslpError {
    /// Byte conversion error. [ByteConversionError::FromSliceTooSmall] signals truncated input.
    #[error("byte conversion error: {0}")]
    ByteConversion(#[from] ByteConversionError),
    /// A field value exceeds its declared bit width.
    #[error(transparent)]
    FieldOverflow(#[from] FieldOverflowError),
    /// Bit offset and width arithmetic exceeds the buffer bounds.
    #[error("bit layout error: {0}")]
    Range(BitFieldError),
    /// The declared frame length disagrees with the actual buffer length.
    #[error("declared frame length {declared} does not match buffer length {actual}")]
    LengthMismatch {
        /// Frame length field plus one.
        declared: usize,
        /// Length of the passed buffer.
        actual: usize,
    },
    /// The frame is too short to hold all fixed-size regions.
    #[error("frame length {frame_len} is smaller than the fixed regions of {fixed_len} octets")]
    Underflow {
        /// Declared frame length.
        frame_len: usize,
        /// Summed length of all regions except the data field.
        fixed_len: usize,
    },
    /// Frame layout contradicts the frame flags or mission configuration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// Data field header pointer does not fit the construction rule.
    #[error(transparent)]
    FhpLvo(#[from] FhpLvoError),
    /// Invalid version number.
    #[error("invalid version number {found}, expected {expected}")]
    InvalidVersionNumber {
        /// Version number found.
        found: u8,
        /// Mission version number.
        expected: u8,
    },
    /// The reserved spare field is not zero and strict checking is enabled.
    #[error("spare field has non-zero value {0}")]
    NonZeroSpare(u8),
    /// The frame error control field does not match the freshly computed value.
    #[error("checksum failure, found FECF {found:02x?}, expected {expected:02x?}")]
    ChecksumFailure {
        /// FECF contained in the frame.
        found: [u8; 4],
        /// FECF computed over the frame.
        expected: [u8; 4],
    },
}

impl From<BitFieldError> for UslpError {
    fn from(e: BitFieldError) -> Self {
        match e {
            BitFieldError::ValueTooWide { value, width } => {
                UslpError::FieldOverflow(FieldOverflowError {
                    field: "bit field",
                    value,
                    width,
                })
            }
            BitFieldError::OutOfRange { .. } => UslpError::Range(e),
        }
    }
}
