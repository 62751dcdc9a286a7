//! # CCSDS space link codecs
//!
//! This crate contains bit-exact encoders and decoders for two CCSDS data units:
//!
//!  - The Transfer Frame of the Unified Space Data Link Protocol (USLP) according to
//!    [CCSDS 732.1-B-2](https://public.ccsds.org/Pubs/732x1b2.pdf), see the [uslp] module.
//!  - The Space Packet according to
//!    [CCSDS Blue Book 133.0-B-2](https://public.ccsds.org/Pubs/133x0b2e1.pdf). The primary
//!    header types live at the crate root, the full packet codec in [space_packet].
//!
//! Both codecs are stateless: mission parameters are passed in as explicit configuration values
//! and every encode or decode call produces a fresh value. All header fields are packed through
//! the [bits] module, which writes fields of arbitrary bit width MSB first into byte buffers.
//!
//! ## Features
//!
//! `spacelink` is a `no_std` crate which requires an allocator.
//!
//! Default features:
//!
//!  - [`std`](https://doc.rust-lang.org/std/): Implements [std::error::Error] for the error types
//!    and enables standard library support of [tracing].
//!
//! Optional features:
//!
//!  - [`serde`](https://serde.rs/): Adds `Serialize` and `Deserialize` implementations for the
//!    configuration and data types.
//!  - [`defmt`](https://defmt.ferrous-systems.com/): Adds `defmt::Format` implementations for
//!    enumerations and error types.
//!
//! ## Example
//!
//! ```rust
//! use spacelink::{PacketType, SpHeader};
//! let sp_header = SpHeader::tc(0x42, 12, 0).expect("Error creating SP header");
//! let mut buf = [0; 6];
//! sp_header.write_to_bytes(&mut buf).unwrap();
//! assert_eq!(buf, [0x10, 0x42, 0xC0, 0x0C, 0x00, 0x00]);
//! assert_eq!(SpHeader::from_bytes(&buf).unwrap(), sp_header);
//! ```
#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

use crate::bits::{BitCursor, BitField, BitReader};
use crate::space_packet::SpacePacketError;
use delegate::delegate;

pub mod bits;
pub mod crc;
pub mod seq_count;
pub mod space_packet;
pub mod uslp;

/// Length of the Space Packet primary header.
pub const SP_HEADER_LEN: usize = 6;
pub const MAX_APID: u16 = 2u16.pow(11) - 1;
pub const MAX_SEQ_COUNT: u16 = 2u16.pow(14) - 1;

/// Generic byte conversion errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteConversionError {
    /// The passed slice is too small. Returns the passed slice length and expected minimum size
    #[error("target slice with size {found} is too small, expected size of at least {expected}")]
    ToSliceTooSmall { found: usize, expected: usize },
    /// The provider buffer is too small, the data is truncated. Returns the passed slice length
    /// and expected minimum size
    #[error("source slice with size {found} too small, expected at least {expected} bytes")]
    FromSliceTooSmall { found: usize, expected: usize },
    /// The slice length differs from the fixed length of the target region.
    #[error("slice with size {found} does not match fixed region size {expected}")]
    InvalidLength { found: usize, expected: usize },
}

/// A field value does not fit into the declared bit width of the field.
///
/// This always points to a bug in the caller or in the mission configuration. Values are never
/// truncated to fit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("value {value} of field {field} exceeds its width of {width} bits")]
pub struct FieldOverflowError {
    /// Name of the field.
    pub field: &'static str,
    /// Rejected value.
    pub value: u64,
    /// Width of the field in bits.
    pub width: usize,
}

/// Check that `value` fits into `width` bits, naming the field on failure.
pub(crate) fn check_field_width(
    field: &'static str,
    value: u64,
    width: usize,
) -> Result<(), FieldOverflowError> {
    if value > bits::max_value_for_width(width) {
        return Err(FieldOverflowError {
            field,
            value,
            width,
        });
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    Tm = 0,
    Tc = 1,
}

impl PacketType {
    /// Decode from a single bit. Only the lowest bit is considered.
    #[inline]
    pub const fn from_bit(bit: u8) -> Self {
        if bit & 0b1 == 0 {
            PacketType::Tm
        } else {
            PacketType::Tc
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, num_enum::TryFromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SequenceFlags {
    ContinuationSegment = 0b00,
    FirstSegment = 0b01,
    LastSegment = 0b10,
    Unsegmented = 0b11,
}

impl SequenceFlags {
    /// Decode from the two bit sequence flags field. Only the lowest two bits are considered.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => SequenceFlags::ContinuationSegment,
            0b01 => SequenceFlags::FirstSegment,
            0b10 => SequenceFlags::LastSegment,
            _ => SequenceFlags::Unsegmented,
        }
    }
}

/// Packet identification: packet type, secondary header flag and APID.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketId {
    pub ptype: PacketType,
    pub sec_header_flag: bool,
    apid: u16,
}

impl PacketId {
    pub fn new(
        ptype: PacketType,
        sec_header_flag: bool,
        apid: u16,
    ) -> Result<PacketId, FieldOverflowError> {
        let mut pid = PacketId {
            ptype,
            sec_header_flag,
            apid: 0,
        };
        pid.set_apid(apid)?;
        Ok(pid)
    }

    /// Set a new Application Process ID (APID). The maximum allowed value for the 11-bit field
    /// is [MAX_APID]. Larger values are rejected and leave the APID unchanged.
    pub fn set_apid(&mut self, apid: u16) -> Result<(), FieldOverflowError> {
        check_field_width("apid", apid as u64, sp_layout::APID.width)?;
        self.apid = apid;
        Ok(())
    }

    pub fn apid(&self) -> u16 {
        self.apid
    }

    /// The raw 13 bit packet identification.
    pub fn raw(&self) -> u16 {
        ((self.ptype as u16) << 12) | ((self.sec_header_flag as u16) << 11) | self.apid
    }
}

impl From<u16> for PacketId {
    fn from(raw_id: u16) -> Self {
        PacketId {
            ptype: PacketType::from_bit((raw_id >> 12) as u8),
            sec_header_flag: ((raw_id >> 11) & 0b1) != 0,
            apid: raw_id & MAX_APID,
        }
    }
}

/// Packet sequence control: sequence flags and the packet sequence count or packet name.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketSequenceCtrl {
    pub seq_flags: SequenceFlags,
    seq_count: u16,
}

impl PacketSequenceCtrl {
    /// Fails if the passed sequence count exceeds [MAX_SEQ_COUNT]
    pub fn new(
        seq_flags: SequenceFlags,
        seq_count: u16,
    ) -> Result<PacketSequenceCtrl, FieldOverflowError> {
        let mut psc = PacketSequenceCtrl {
            seq_flags,
            seq_count: 0,
        };
        psc.set_seq_count(seq_count)?;
        Ok(psc)
    }

    pub fn raw(&self) -> u16 {
        ((self.seq_flags as u16) << 14) | self.seq_count
    }

    /// Set a new sequence count. The maximum allowed value for the 14-bit field is 16383.
    pub fn set_seq_count(&mut self, ssc: u16) -> Result<(), FieldOverflowError> {
        check_field_width("sequence count", ssc as u64, sp_layout::SEQ_COUNT.width)?;
        self.seq_count = ssc;
        Ok(())
    }

    pub fn seq_count(&self) -> u16 {
        self.seq_count
    }

    /// Sequence control with the count incremented modulo 16384.
    ///
    /// Monotonicity across packets is a concern of the sender.
    pub fn next_count(&self) -> Self {
        PacketSequenceCtrl {
            seq_flags: self.seq_flags,
            seq_count: (self.seq_count + 1) & MAX_SEQ_COUNT,
        }
    }
}

impl From<u16> for PacketSequenceCtrl {
    fn from(raw: u16) -> Self {
        PacketSequenceCtrl {
            seq_flags: SequenceFlags::from_bits((raw >> 14) as u8),
            seq_count: raw & MAX_SEQ_COUNT,
        }
    }
}

/// Bit layout of the Space Packet primary header.
pub mod sp_layout {
    use crate::bits::BitField;

    pub const VERSION: BitField = BitField::new(0, 3);
    pub const PACKET_TYPE: BitField = BitField::new(3, 1);
    pub const SEC_HEADER_FLAG: BitField = BitField::new(4, 1);
    pub const APID: BitField = BitField::new(5, 11);
    pub const SEQ_FLAGS: BitField = BitField::new(16, 2);
    pub const SEQ_COUNT: BitField = BitField::new(18, 14);
    pub const DATA_LEN: BitField = BitField::new(32, 16);
}

/// Generic trait to access fields of a CCSDS space packet header according to CCSDS 133.0-B-2
pub trait CcsdsPacket {
    fn ccsds_version(&self) -> u8;
    fn packet_id(&self) -> PacketId;
    fn psc(&self) -> PacketSequenceCtrl;

    /// Retrieve data length field
    fn data_len(&self) -> u16;
    /// Retrieve the total packet size based on the data length field
    fn total_len(&self) -> usize {
        usize::from(self.data_len()) + SP_HEADER_LEN + 1
    }

    #[inline]
    fn ptype(&self) -> PacketType {
        self.packet_id().ptype
    }

    #[inline]
    fn is_tm(&self) -> bool {
        self.ptype() == PacketType::Tm
    }

    #[inline]
    fn is_tc(&self) -> bool {
        self.ptype() == PacketType::Tc
    }

    /// Retrieve the secondary header flag. Returns true if a secondary header is present
    /// and false if it is not
    #[inline]
    fn sec_header_flag(&self) -> bool {
        self.packet_id().sec_header_flag
    }

    /// Retrieve Application Process ID
    #[inline]
    fn apid(&self) -> u16 {
        self.packet_id().apid
    }

    #[inline]
    fn seq_count(&self) -> u16 {
        self.psc().seq_count
    }

    #[inline]
    fn sequence_flags(&self) -> SequenceFlags {
        self.psc().seq_flags
    }
}

/// Space Packet Primary Header according to CCSDS 133.0-B-2
///
/// # Arguments
///
/// * `version` - CCSDS version field, occupies the first 3 bits of the raw header
/// * `packet_id` - Packet Identifier, which can also be used as a start marker. Occupies the last
///   13 bits of the first two bytes of the raw header
/// * `psc` - Packet Sequence Control, occupies the third and fourth byte of the raw header
/// * `data_len` - Data length field occupies the fifth and the sixth byte of the raw header. Its
///   value is the length of the packet data field minus one.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpHeader {
    pub version: u8,
    pub packet_id: PacketId,
    pub psc: PacketSequenceCtrl,
    pub data_len: u16,
}

impl Default for SpHeader {
    fn default() -> Self {
        SpHeader {
            version: 0,
            packet_id: PacketId {
                ptype: PacketType::Tm,
                apid: 0,
                sec_header_flag: false,
            },
            psc: PacketSequenceCtrl {
                seq_flags: SequenceFlags::Unsegmented,
                seq_count: 0,
            },
            data_len: 0,
        }
    }
}

impl SpHeader {
    /// Create a new unsegmented Space Packet Header. Fails if the APID or sequence count
    /// argument exceed [MAX_APID] or [MAX_SEQ_COUNT] respectively.
    pub fn new(
        ptype: PacketType,
        sec_header: bool,
        apid: u16,
        seq_count: u16,
        data_len: u16,
    ) -> Result<Self, FieldOverflowError> {
        Ok(SpHeader {
            version: 0,
            packet_id: PacketId::new(ptype, sec_header, apid)?,
            psc: PacketSequenceCtrl::new(SequenceFlags::Unsegmented, seq_count)?,
            data_len,
        })
    }

    /// Helper function for telemetry space packet headers. The packet type  field will be
    /// set accordingly.
    pub fn tm(apid: u16, seq_count: u16, data_len: u16) -> Result<Self, FieldOverflowError> {
        Self::new(PacketType::Tm, false, apid, seq_count, data_len)
    }

    /// Helper function for telecommand space packet headers. The packet type  field will be
    /// set accordingly.
    pub fn tc(apid: u16, seq_count: u16, data_len: u16) -> Result<Self, FieldOverflowError> {
        Self::new(PacketType::Tc, false, apid, seq_count, data_len)
    }

    delegate!(to self.packet_id {
        pub fn set_apid(&mut self, apid: u16) -> Result<(), FieldOverflowError>;
    });

    delegate!(to self.psc {
        pub fn set_seq_count(&mut self, seq_count: u16) -> Result<(), FieldOverflowError>;
    });

    pub fn set_seq_flags(&mut self, seq_flags: SequenceFlags) {
        self.psc.seq_flags = seq_flags;
    }

    pub fn set_sec_header_flag(&mut self) {
        self.packet_id.sec_header_flag = true;
    }

    pub fn clear_sec_header_flag(&mut self) {
        self.packet_id.sec_header_flag = false;
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_id.ptype = packet_type;
    }

    /// Parse the primary header from the first [SP_HEADER_LEN] bytes of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, SpacePacketError> {
        if buf.len() < SP_HEADER_LEN {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: SP_HEADER_LEN,
            }
            .into());
        }
        let mut reader = BitReader::new(&buf[0..SP_HEADER_LEN]);
        let version = reader.take(sp_layout::VERSION.width)? as u8;
        let ptype = PacketType::from_bit(reader.take(sp_layout::PACKET_TYPE.width)? as u8);
        let sec_header_flag = reader.take_bool()?;
        let apid = reader.take(sp_layout::APID.width)? as u16;
        let seq_flags = SequenceFlags::from_bits(reader.take(sp_layout::SEQ_FLAGS.width)? as u8);
        let seq_count = reader.take(sp_layout::SEQ_COUNT.width)? as u16;
        let data_len = reader.take(sp_layout::DATA_LEN.width)? as u16;
        Ok(SpHeader {
            version,
            packet_id: PacketId {
                ptype,
                sec_header_flag,
                apid,
            },
            psc: PacketSequenceCtrl {
                seq_flags,
                seq_count,
            },
            data_len,
        })
    }

    /// Write the primary header to the first [SP_HEADER_LEN] bytes of `buf`.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, SpacePacketError> {
        if buf.len() < SP_HEADER_LEN {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: SP_HEADER_LEN,
            }
            .into());
        }
        check_field_width(
            "packet version",
            self.version as u64,
            sp_layout::VERSION.width,
        )?;
        let mut cursor = BitCursor::new(&mut buf[0..SP_HEADER_LEN]);
        let fields: [(BitField, u64); 7] = [
            (sp_layout::VERSION, self.version as u64),
            (sp_layout::PACKET_TYPE, self.packet_id.ptype as u64),
            (
                sp_layout::SEC_HEADER_FLAG,
                self.packet_id.sec_header_flag as u64,
            ),
            (sp_layout::APID, self.packet_id.apid as u64),
            (sp_layout::SEQ_FLAGS, self.psc.seq_flags as u64),
            (sp_layout::SEQ_COUNT, self.psc.seq_count as u64),
            (sp_layout::DATA_LEN, self.data_len as u64),
        ];
        for (field, value) in fields {
            debug_assert_eq!(cursor.bit_pos(), field.offset);
            cursor.put(field.width, value)?;
        }
        Ok(SP_HEADER_LEN)
    }

    /// Write [self] to a newly allocated [alloc::vec::Vec] and return it.
    pub fn to_vec(&self) -> Result<alloc::vec::Vec<u8>, SpacePacketError> {
        let mut vec = alloc::vec![0; SP_HEADER_LEN];
        self.write_to_bytes(&mut vec)?;
        Ok(vec)
    }
}

impl CcsdsPacket for SpHeader {
    #[inline]
    fn ccsds_version(&self) -> u8 {
        self.version
    }

    #[inline]
    fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    #[inline]
    fn psc(&self) -> PacketSequenceCtrl {
        self.psc
    }

    #[inline]
    fn data_len(&self) -> u16 {
        self.data_len
    }
}
