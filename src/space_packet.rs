//! Full Space Packet codec: primary header, optional secondary header and user data.
//!
//! The contents of the secondary header (time codes, ancillary data) are mission specific and not
//! self-describing. This module treats the secondary header as opaque octets and relies on the
//! caller to supply its length when decoding.
//!
//! ## Example
//!
//! ```rust
//! use spacelink::space_packet::SpacePacket;
//! use spacelink::{CcsdsPacket, SpHeader};
//!
//! let header = SpHeader::tm(0x22, 5, 0).unwrap();
//! let packet = SpacePacket::new(header, None, &[1, 2, 3, 4]).unwrap();
//! assert_eq!(packet.header().data_len(), 3);
//! let raw = packet.to_vec().unwrap();
//! assert_eq!(SpacePacket::from_bytes(&raw, 0).unwrap(), packet);
//! ```
use crate::bits::BitFieldError;
use crate::{
    ByteConversionError, CcsdsPacket, FieldOverflowError, PacketId, PacketSequenceCtrl, SpHeader,
    SP_HEADER_LEN,
};
use alloc::vec::Vec;

/// Maximum length of the packet data field (secondary header and user data).
pub const MAX_DATA_FIELD_LEN: usize = u16::MAX as usize + 1;

/// Space Packet error enumeration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpacePacketError {
    /// Byte conversion error, for example truncated input.
    #[error("byte conversion error: {0}")]
    ByteConversion(#[from] ByteConversionError),
    /// A header field value exceeds its bit width.
    #[error(transparent)]
    FieldOverflow(#[from] FieldOverflowError),
    /// Bit layout error. This is a bug in a layout table.
    #[error("bit layout error: {0}")]
    Range(BitFieldError),
    /// The packet data field must contain at least one octet.
    #[error("packet data field is empty")]
    EmptyDataField,
    /// The secondary header flag does not match the presence of a secondary header.
    #[error("secondary header flag {flag} does not match secondary header presence")]
    SecondaryHeaderMismatch {
        /// Value of the secondary header flag.
        flag: bool,
    },
    /// The secondary header is longer than the whole packet data field.
    #[error("secondary header length {sec_header_len} exceeds data field length {data_field_len}")]
    Underflow {
        /// Length of the packet data field derived from the data length field.
        data_field_len: usize,
        /// Expected length of the secondary header.
        sec_header_len: usize,
    },
}

impl From<BitFieldError> for SpacePacketError {
    fn from(e: BitFieldError) -> Self {
        match e {
            BitFieldError::ValueTooWide { value, width } => {
                SpacePacketError::FieldOverflow(FieldOverflowError {
                    field: "bit field",
                    value,
                    width,
                })
            }
            BitFieldError::OutOfRange { .. } => SpacePacketError::Range(e),
        }
    }
}

/// Owned Space Packet.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpacePacket {
    header: SpHeader,
    secondary_header: Option<Vec<u8>>,
    user_data: Vec<u8>,
}

impl SpacePacket {
    /// Constructor.
    ///
    /// The secondary header flag is set if a secondary header is passed and cleared otherwise.
    /// The data length field is calculated from the secondary header and user data length.
    pub fn new(
        mut header: SpHeader,
        secondary_header: Option<&[u8]>,
        user_data: &[u8],
    ) -> Result<Self, SpacePacketError> {
        header.packet_id.sec_header_flag = secondary_header.is_some();
        let data_field_len = secondary_header.map_or(0, |sec| sec.len()) + user_data.len();
        header.data_len = data_len_field(data_field_len)?;
        Ok(Self {
            header,
            secondary_header: secondary_header.map(|sec| sec.to_vec()),
            user_data: user_data.to_vec(),
        })
    }

    /// Primary header.
    #[inline]
    pub fn header(&self) -> &SpHeader {
        &self.header
    }

    /// Secondary header when present.
    #[inline]
    pub fn secondary_header(&self) -> Option<&[u8]> {
        self.secondary_header.as_deref()
    }

    /// User data.
    #[inline]
    pub fn user_data(&self) -> &[u8] {
        &self.user_data
    }

    /// Length of the packet data field.
    #[inline]
    pub fn data_field_len(&self) -> usize {
        self.secondary_header.as_ref().map_or(0, |sec| sec.len()) + self.user_data.len()
    }

    /// Length of the packet when written to bytes.
    #[inline]
    pub fn len_written(&self) -> usize {
        SP_HEADER_LEN + self.data_field_len()
    }

    /// Write [self] to the provided byte buffer.
    ///
    /// The data length field is derived from the actual data field length.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, SpacePacketError> {
        let flag = self.header.packet_id.sec_header_flag;
        if flag != self.secondary_header.is_some() {
            return Err(SpacePacketError::SecondaryHeaderMismatch { flag });
        }
        let full_len = self.len_written();
        if buf.len() < full_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: full_len,
            }
            .into());
        }
        let mut header = self.header;
        header.data_len = data_len_field(self.data_field_len())?;
        let mut current_idx = header.write_to_bytes(buf)?;
        if let Some(sec_header) = &self.secondary_header {
            buf[current_idx..current_idx + sec_header.len()].copy_from_slice(sec_header);
            current_idx += sec_header.len();
        }
        buf[current_idx..current_idx + self.user_data.len()].copy_from_slice(&self.user_data);
        current_idx += self.user_data.len();
        Ok(current_idx)
    }

    /// Write [self] to a newly allocated [Vec] and return it.
    pub fn to_vec(&self) -> Result<Vec<u8>, SpacePacketError> {
        let mut vec = alloc::vec![0; self.len_written()];
        self.write_to_bytes(&mut vec)?;
        Ok(vec)
    }

    /// Parse a Space Packet from raw bytes.
    ///
    /// `sec_header_len` is the mission specific length of the secondary header. It is only
    /// used if the secondary header flag is set. Trailing bytes after the packet are ignored.
    pub fn from_bytes(buf: &[u8], sec_header_len: usize) -> Result<Self, SpacePacketError> {
        let header = SpHeader::from_bytes(buf)?;
        let total_len = header.total_len();
        if buf.len() < total_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: total_len,
            }
            .into());
        }
        let data_field = &buf[SP_HEADER_LEN..total_len];
        let mut secondary_header = None;
        let mut user_data = data_field;
        if header.sec_header_flag() {
            if sec_header_len > data_field.len() {
                return Err(SpacePacketError::Underflow {
                    data_field_len: data_field.len(),
                    sec_header_len,
                });
            }
            let (sec, data) = data_field.split_at(sec_header_len);
            secondary_header = Some(sec.to_vec());
            user_data = data;
        }
        Ok(Self {
            header,
            secondary_header,
            user_data: user_data.to_vec(),
        })
    }
}

impl CcsdsPacket for SpacePacket {
    #[inline]
    fn ccsds_version(&self) -> u8 {
        self.header.version
    }

    #[inline]
    fn packet_id(&self) -> PacketId {
        self.header.packet_id
    }

    #[inline]
    fn psc(&self) -> PacketSequenceCtrl {
        self.header.psc
    }

    #[inline]
    fn data_len(&self) -> u16 {
        self.header.data_len
    }
}

fn data_len_field(data_field_len: usize) -> Result<u16, SpacePacketError> {
    if data_field_len == 0 {
        return Err(SpacePacketError::EmptyDataField);
    }
    if data_field_len > MAX_DATA_FIELD_LEN {
        return Err(FieldOverflowError {
            field: "packet data length",
            value: (data_field_len - 1) as u64,
            width: 16,
        }
        .into());
    }
    Ok((data_field_len - 1) as u16)
}
