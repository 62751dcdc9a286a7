//! Transfer frame primary header codec.
use super::{
    BypassSequenceControlFlag, MissionConfig, ProtocolControlCommandFlag, SourceOrDestField,
    SpareCheck, UslpError,
};
use crate::bits::{BitCursor, BitReader};
use crate::{check_field_width, ByteConversionError};

/// Bit layout of the primary header, offsets counted MSB first from the first octet.
pub mod layout {
    use crate::bits::BitField;

    /// Transfer frame version number.
    pub const VERSION: BitField = BitField::new(0, 4);
    /// Spacecraft ID.
    pub const SCID: BitField = BitField::new(4, 16);
    /// Source or destination identifier.
    pub const SOURCE_OR_DEST: BitField = BitField::new(20, 1);
    /// Virtual channel ID.
    pub const VCID: BitField = BitField::new(21, 6);
    /// MAP ID.
    pub const MAP_ID: BitField = BitField::new(27, 4);
    /// End of frame primary header flag.
    pub const END_OF_HEADER: BitField = BitField::new(31, 1);
    /// Frame length, total octets minus one.
    pub const FRAME_LEN: BitField = BitField::new(32, 16);
    /// Bypass / sequence control flag.
    pub const BYPASS: BitField = BitField::new(48, 1);
    /// Protocol control command flag.
    pub const PROTOCOL_CMD: BitField = BitField::new(49, 1);
    /// Reserved spare bits.
    pub const SPARE: BitField = BitField::new(50, 2);
    /// Operational control field flag.
    pub const OCF_FLAG: BitField = BitField::new(52, 1);
    /// VC frame count length selector.
    pub const FRAME_COUNT_LEN: BitField = BitField::new(53, 3);
    /// Offset of the VC frame count. Its width depends on the mission configuration.
    pub const FRAME_COUNT_OFFSET: usize = 56;
    /// Length of the part of the header preceding the VC frame count.
    pub const FIXED_LEN: usize = FRAME_COUNT_OFFSET / 8;
}

/// Primary header of a USLP transfer frame.
///
/// All fields are plain values. Their widths are checked when the header is written, so a value
/// which does not fit its field is reported instead of being truncated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrimaryHeader {
    /// Transfer frame version number, 4 bits.
    pub version: u8,
    /// Spacecraft ID.
    pub spacecraft_id: u16,
    /// Source or destination identifier.
    pub source_or_dest_field: SourceOrDestField,
    /// Virtual channel ID, 6 bits.
    pub vc_id: u8,
    /// MAP ID, 4 bits.
    pub map_id: u8,
    /// End of frame primary header flag.
    pub end_of_header_flag: bool,
    /// Frame length field. Equals the total frame length in octets minus one.
    pub frame_len_field: u16,
    /// Bypass sequence control flag.
    pub sequence_control_flag: BypassSequenceControlFlag,
    /// Protocol control command flag.
    pub protocol_control_command_flag: ProtocolControlCommandFlag,
    /// Reserved spare bits, 2 bits. Should be zero.
    pub spare: u8,
    /// Operational control field flag.
    pub ocf_flag: bool,
    /// VC frame count length selector, 3 bits.
    pub vc_frame_count_len: u8,
    /// VC frame count.
    pub vc_frame_count: u64,
}

impl PrimaryHeader {
    /// Header with the mission parameters taken from `config`, all flags cleared and a frame
    /// count of zero. The frame count length selector matches the configured count width.
    pub fn new(config: &MissionConfig, vc_id: u8) -> Self {
        Self {
            version: config.protocol_version,
            spacecraft_id: config.spacecraft_id,
            source_or_dest_field: config.source_or_dest_field,
            vc_id,
            map_id: config.map_id,
            end_of_header_flag: false,
            frame_len_field: 0,
            sequence_control_flag: BypassSequenceControlFlag::SequenceControlledQoS,
            protocol_control_command_flag: ProtocolControlCommandFlag::TfdfContainsUserData,
            spare: 0,
            ocf_flag: false,
            vc_frame_count_len: config.frame_count_width.default_selector(0),
            vc_frame_count: 0,
        }
    }

    /// Set the frame length field from the total frame length in octets.
    ///
    /// The field contains a length count that equals one fewer than the total octets in the
    /// transfer frame (4.1.2.7.2). A length of zero can not be expressed and is rejected.
    pub fn set_frame_len(&mut self, frame_len: usize) -> Result<(), UslpError> {
        let value = frame_len.checked_sub(1).ok_or(UslpError::Underflow {
            frame_len,
            fixed_len: 1,
        })?;
        check_field_width("frame length", value as u64, layout::FRAME_LEN.width)?;
        self.frame_len_field = value as u16;
        Ok(())
    }

    /// Length of the entire frame.
    #[inline(always)]
    pub fn len_frame(&self) -> usize {
        self.frame_len_field as usize + 1
    }

    /// Width of the VC frame count field in octets.
    #[inline]
    pub fn frame_count_octets(&self, config: &MissionConfig) -> usize {
        config.frame_count_width.octets(self.vc_frame_count_len)
    }

    /// Length of primary header when written to bytes.
    #[inline]
    pub fn len_header(&self, config: &MissionConfig) -> usize {
        layout::FIXED_LEN + self.frame_count_octets(config)
    }

    /// Check every field against its width and the version against the mission version.
    pub fn validate(&self, config: &MissionConfig) -> Result<(), UslpError> {
        check_field_width("version", self.version as u64, layout::VERSION.width)?;
        check_field_width("VCID", self.vc_id as u64, layout::VCID.width)?;
        check_field_width("MAP ID", self.map_id as u64, layout::MAP_ID.width)?;
        check_field_width("spare", self.spare as u64, layout::SPARE.width)?;
        check_field_width(
            "VC frame count length",
            self.vc_frame_count_len as u64,
            layout::FRAME_COUNT_LEN.width,
        )?;
        check_field_width(
            "VC frame count",
            self.vc_frame_count,
            self.frame_count_octets(config) * 8,
        )?;
        if self.version != config.protocol_version {
            return Err(UslpError::InvalidVersionNumber {
                found: self.version,
                expected: config.protocol_version,
            });
        }
        Ok(())
    }

    /// Parse [Self] from raw bytes.
    pub fn from_bytes(config: &MissionConfig, buf: &[u8]) -> Result<Self, UslpError> {
        if buf.len() < layout::FIXED_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: layout::FIXED_LEN,
            }
            .into());
        }
        let mut reader = BitReader::new(buf);
        let version = reader.take(layout::VERSION.width)? as u8;
        if version != config.protocol_version {
            return Err(UslpError::InvalidVersionNumber {
                found: version,
                expected: config.protocol_version,
            });
        }
        let spacecraft_id = reader.take(layout::SCID.width)? as u16;
        let source_or_dest_field = SourceOrDestField::from(reader.take_bool()?);
        let vc_id = reader.take(layout::VCID.width)? as u8;
        let map_id = reader.take(layout::MAP_ID.width)? as u8;
        let end_of_header_flag = reader.take_bool()?;
        let frame_len_field = reader.take(layout::FRAME_LEN.width)? as u16;
        let sequence_control_flag = BypassSequenceControlFlag::from(reader.take_bool()?);
        let protocol_control_command_flag = ProtocolControlCommandFlag::from(reader.take_bool()?);
        let spare = reader.take(layout::SPARE.width)? as u8;
        if spare != 0 {
            match config.spare_check {
                SpareCheck::Lenient => {
                    tracing::warn!(spare, vc_id, "primary header spare field is not zero");
                }
                SpareCheck::Strict => return Err(UslpError::NonZeroSpare(spare)),
            }
        }
        let ocf_flag = reader.take_bool()?;
        let vc_frame_count_len = reader.take(layout::FRAME_COUNT_LEN.width)? as u8;
        let count_octets = config.frame_count_width.octets(vc_frame_count_len);
        if buf.len() < layout::FIXED_LEN + count_octets {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: layout::FIXED_LEN + count_octets,
            }
            .into());
        }
        debug_assert_eq!(reader.bit_pos(), layout::FRAME_COUNT_OFFSET);
        let vc_frame_count = reader.take(count_octets * 8)?;
        Ok(Self {
            version,
            spacecraft_id,
            source_or_dest_field,
            vc_id,
            map_id,
            end_of_header_flag,
            frame_len_field,
            sequence_control_flag,
            protocol_control_command_flag,
            spare,
            ocf_flag,
            vc_frame_count_len,
            vc_frame_count,
        })
    }

    /// Write primary header to bytes.
    pub fn write_to_bytes(&self, config: &MissionConfig, buf: &mut [u8]) -> Result<usize, UslpError> {
        self.validate(config)?;
        let len_header = self.len_header(config);
        if buf.len() < len_header {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: len_header,
            }
            .into());
        }
        let mut cursor = BitCursor::new(&mut buf[0..len_header]);
        cursor.put(layout::VERSION.width, self.version as u64)?;
        cursor.put(layout::SCID.width, self.spacecraft_id as u64)?;
        cursor.put_bool(self.source_or_dest_field == SourceOrDestField::Dest)?;
        cursor.put(layout::VCID.width, self.vc_id as u64)?;
        cursor.put(layout::MAP_ID.width, self.map_id as u64)?;
        cursor.put_bool(self.end_of_header_flag)?;
        cursor.put(layout::FRAME_LEN.width, self.frame_len_field as u64)?;
        cursor.put(
            layout::BYPASS.width,
            u8::from(self.sequence_control_flag) as u64,
        )?;
        cursor.put(
            layout::PROTOCOL_CMD.width,
            u8::from(self.protocol_control_command_flag) as u64,
        )?;
        cursor.put(layout::SPARE.width, self.spare as u64)?;
        cursor.put_bool(self.ocf_flag)?;
        cursor.put(
            layout::FRAME_COUNT_LEN.width,
            self.vc_frame_count_len as u64,
        )?;
        cursor.put(
            (len_header - layout::FIXED_LEN) * 8,
            self.vc_frame_count,
        )?;
        Ok(len_header)
    }

    /// Write [self] to a newly allocated [alloc::vec::Vec] and return it.
    pub fn to_vec(&self, config: &MissionConfig) -> Result<alloc::vec::Vec<u8>, UslpError> {
        let mut vec = alloc::vec![0; self.len_header(config)];
        self.write_to_bytes(config, &mut vec)?;
        Ok(vec)
    }
}
