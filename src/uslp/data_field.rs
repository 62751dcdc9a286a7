//! Transfer frame data field: security header, data field header, data zone and security trailer.
use super::{ConstructionRule, FhpLvoError, UslpError, UslpProtocolId};
use crate::bits::{BitCursor, BitReader};
use crate::{check_field_width, ByteConversionError};
use alloc::vec::Vec;

/// Length of the security header in octets.
pub const SECURITY_HEADER_LEN: usize = 6;
/// Length of the security trailer in octets.
pub const SECURITY_TRAILER_LEN: usize = 16;

const CONSTRUCTION_RULE_WIDTH: usize = 3;
const PROTOCOL_ID_WIDTH: usize = 5;
const POINTER_WIDTH: usize = 16;

/// Opaque security header preceding the data field header.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityHeader(pub [u8; SECURITY_HEADER_LEN]);

impl TryFrom<&[u8]> for SecurityHeader {
    type Error = ByteConversionError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        fixed_region(value).map(Self)
    }
}

/// Opaque security trailer following the data zone.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SecurityTrailer(pub [u8; SECURITY_TRAILER_LEN]);

impl TryFrom<&[u8]> for SecurityTrailer {
    type Error = ByteConversionError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        fixed_region(value).map(Self)
    }
}

/// Copy a slice into an array, requiring the exact array length.
pub(crate) fn fixed_region<const N: usize>(value: &[u8]) -> Result<[u8; N], ByteConversionError> {
    value.try_into().map_err(|_| {
        if value.len() < N {
            ByteConversionError::FromSliceTooSmall {
                found: value.len(),
                expected: N,
            }
        } else {
            ByteConversionError::InvalidLength {
                found: value.len(),
                expected: N,
            }
        }
    })
}

/// Transfer frame data field header.
///
/// The first header or last valid octet pointer only exists for construction rules which
/// indicate a fixed-length TFDZ, so the two layouts are separate variants.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataFieldHeader {
    /// Three octet header of a fixed-length TFDZ.
    WithPointer {
        /// Construction rule for the TFDZ.
        rule: ConstructionRule,
        /// USLP protocol ID, 5 bits.
        protocol_id: u8,
        /// First header or last valid octet pointer.
        pointer: u16,
    },
    /// One octet header of a variable-length TFDZ.
    WithoutPointer {
        /// Construction rule for the TFDZ.
        rule: ConstructionRule,
        /// USLP protocol ID, 5 bits.
        protocol_id: u8,
    },
}

impl DataFieldHeader {
    /// Constructor for the transfer frame data field header.
    ///
    /// This constructor also checks whether the passed first header pointer or last valid octet
    /// field is compatible to the construction rule.
    pub const fn new(
        rule: ConstructionRule,
        protocol_id: UslpProtocolId,
        pointer: Option<u16>,
    ) -> Result<Self, FhpLvoError> {
        Self::new_unchecked_id(rule, protocol_id as u8, pointer)
    }

    /// Constructor taking the raw protocol ID, which may be any 5-bit value.
    pub fn new_with_raw_protocol_id(
        rule: ConstructionRule,
        protocol_id: u8,
        pointer: Option<u16>,
    ) -> Result<Self, UslpError> {
        check_field_width("protocol ID", protocol_id as u64, PROTOCOL_ID_WIDTH)?;
        Ok(Self::new_unchecked_id(rule, protocol_id, pointer)?)
    }

    const fn new_unchecked_id(
        rule: ConstructionRule,
        protocol_id: u8,
        pointer: Option<u16>,
    ) -> Result<Self, FhpLvoError> {
        match (rule.applicable_to_fixed_len_tfdz(), pointer) {
            (true, Some(pointer)) => Ok(Self::WithPointer {
                rule,
                protocol_id,
                pointer,
            }),
            (false, None) => Ok(Self::WithoutPointer { rule, protocol_id }),
            _ => Err(FhpLvoError(rule)),
        }
    }

    /// Length of the header when written to bytes.
    #[inline]
    pub const fn len_header(&self) -> usize {
        match self {
            Self::WithPointer { .. } => 3,
            Self::WithoutPointer { .. } => 1,
        }
    }

    /// Construction rule.
    #[inline]
    pub const fn construction_rule(&self) -> ConstructionRule {
        match self {
            Self::WithPointer { rule, .. } | Self::WithoutPointer { rule, .. } => *rule,
        }
    }

    /// Raw 5-bit USLP protocol ID.
    #[inline]
    pub const fn protocol_id(&self) -> u8 {
        match self {
            Self::WithPointer { protocol_id, .. } | Self::WithoutPointer { protocol_id, .. } => {
                *protocol_id
            }
        }
    }

    /// USLP protocol ID, or [None] if the raw value is not an assigned ID.
    #[inline]
    pub fn uslp_protocol_id(&self) -> Option<UslpProtocolId> {
        UslpProtocolId::try_from(self.protocol_id()).ok()
    }

    /// FHP or LVO field when present.
    #[inline]
    pub const fn fhp_or_lvo(&self) -> Option<u16> {
        match self {
            Self::WithPointer { pointer, .. } => Some(*pointer),
            Self::WithoutPointer { .. } => None,
        }
    }

    /// Parse [Self] from raw bytes.
    ///
    /// The construction rule is read first and alone decides whether a pointer follows.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, UslpError> {
        if buf.is_empty() {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: 0,
                expected: 1,
            }
            .into());
        }
        let mut reader = BitReader::new(buf);
        let rule = ConstructionRule::from_bits(reader.take(CONSTRUCTION_RULE_WIDTH)? as u8);
        let protocol_id = reader.take(PROTOCOL_ID_WIDTH)? as u8;
        if !rule.applicable_to_fixed_len_tfdz() {
            return Ok(Self::WithoutPointer { rule, protocol_id });
        }
        if buf.len() < 3 {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: 3,
            }
            .into());
        }
        let pointer = reader.take(POINTER_WIDTH)? as u16;
        Ok(Self::WithPointer {
            rule,
            protocol_id,
            pointer,
        })
    }

    /// Write [self] to the provided byte buffer.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, UslpError> {
        let full_len = self.len_header();
        if buf.len() < full_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: full_len,
            }
            .into());
        }
        check_field_width("protocol ID", self.protocol_id() as u64, PROTOCOL_ID_WIDTH)?;
        let mut cursor = BitCursor::new(&mut buf[0..full_len]);
        cursor.put(
            CONSTRUCTION_RULE_WIDTH,
            u8::from(self.construction_rule()) as u64,
        )?;
        cursor.put(PROTOCOL_ID_WIDTH, self.protocol_id() as u64)?;
        if let Some(pointer) = self.fhp_or_lvo() {
            cursor.put(POINTER_WIDTH, pointer as u64)?;
        }
        Ok(full_len)
    }
}

/// Transfer frame data field.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataField {
    /// Security header.
    pub security_header: SecurityHeader,
    /// Data field header.
    pub header: DataFieldHeader,
    /// Transfer frame data zone.
    pub data_zone: Vec<u8>,
    /// Security trailer.
    pub security_trailer: SecurityTrailer,
}

impl DataField {
    /// Constructor.
    pub fn new(
        security_header: SecurityHeader,
        header: DataFieldHeader,
        data_zone: &[u8],
        security_trailer: SecurityTrailer,
    ) -> Self {
        Self {
            security_header,
            header,
            data_zone: data_zone.to_vec(),
            security_trailer,
        }
    }

    /// Length of all regions except the data zone.
    #[inline]
    pub const fn len_overhead(&self) -> usize {
        SECURITY_HEADER_LEN + self.header.len_header() + SECURITY_TRAILER_LEN
    }

    /// Length of the data field when written to bytes.
    #[inline]
    pub fn len_written(&self) -> usize {
        self.len_overhead() + self.data_zone.len()
    }

    /// Write [self] to the provided byte buffer.
    pub fn write_to_bytes(&self, buf: &mut [u8]) -> Result<usize, UslpError> {
        let full_len = self.len_written();
        if buf.len() < full_len {
            return Err(ByteConversionError::ToSliceTooSmall {
                found: buf.len(),
                expected: full_len,
            }
            .into());
        }
        let mut current_idx = 0;
        buf[0..SECURITY_HEADER_LEN].copy_from_slice(&self.security_header.0);
        current_idx += SECURITY_HEADER_LEN;
        current_idx += self.header.write_to_bytes(&mut buf[current_idx..])?;
        buf[current_idx..current_idx + self.data_zone.len()].copy_from_slice(&self.data_zone);
        current_idx += self.data_zone.len();
        buf[current_idx..current_idx + SECURITY_TRAILER_LEN]
            .copy_from_slice(&self.security_trailer.0);
        current_idx += SECURITY_TRAILER_LEN;
        Ok(current_idx)
    }

    /// Write [self] to a newly allocated [alloc::vec::Vec] and return it.
    pub fn to_vec(&self) -> Result<Vec<u8>, UslpError> {
        let mut vec = alloc::vec![0; self.len_written()];
        self.write_to_bytes(&mut vec)?;
        Ok(vec)
    }

    /// Parse [Self] from a complete data field region.
    ///
    /// All octets between the data field header and the security trailer belong to the data zone.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, UslpError> {
        let min_len = SECURITY_HEADER_LEN + 1 + SECURITY_TRAILER_LEN;
        if buf.len() < min_len {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: min_len,
            }
            .into());
        }
        let security_header = SecurityHeader::try_from(&buf[0..SECURITY_HEADER_LEN])?;
        let header = DataFieldHeader::from_bytes(&buf[SECURITY_HEADER_LEN..])?;
        let zone_start = SECURITY_HEADER_LEN + header.len_header();
        let overhead = zone_start + SECURITY_TRAILER_LEN;
        if buf.len() < overhead {
            return Err(ByteConversionError::FromSliceTooSmall {
                found: buf.len(),
                expected: overhead,
            }
            .into());
        }
        let trailer_start = buf.len() - SECURITY_TRAILER_LEN;
        Ok(Self {
            security_header,
            header,
            data_zone: buf[zone_start..trailer_start].to_vec(),
            security_trailer: SecurityTrailer::try_from(&buf[trailer_start..])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldOverflowError;

    fn octet_stream_header() -> DataFieldHeader {
        DataFieldHeader::new(
            ConstructionRule::NoSegmentation,
            UslpProtocolId::UserDefinedOctetStream,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_header_len_correctness() {
        let mut tfdh = DataFieldHeader::new(
            ConstructionRule::NoSegmentation,
            UslpProtocolId::SpacePacketsOrEncapsulation,
            None,
        )
        .unwrap();
        assert_eq!(tfdh.len_header(), 1);
        tfdh = DataFieldHeader::new(
            ConstructionRule::PacketSpanningMultipleFrames,
            UslpProtocolId::SpacePacketsOrEncapsulation,
            Some(0),
        )
        .unwrap();
        assert_eq!(tfdh.len_header(), 3);
        tfdh = DataFieldHeader::new(
            ConstructionRule::ContinuingPortionOfMapaSdu,
            UslpProtocolId::Cop1ControlCommands,
            Some(5),
        )
        .unwrap();
        assert_eq!(tfdh.len_header(), 3);
        assert_eq!(tfdh.fhp_or_lvo(), Some(5));
        assert_eq!(tfdh.protocol_id(), 0b00001);
        assert_eq!(tfdh.uslp_protocol_id(), Some(UslpProtocolId::Cop1ControlCommands));
    }

    #[test]
    fn test_pointer_rule_mismatch() {
        assert_eq!(
            DataFieldHeader::new(
                ConstructionRule::PacketSpanningMultipleFrames,
                UslpProtocolId::SpacePacketsOrEncapsulation,
                None,
            )
            .unwrap_err(),
            FhpLvoError(ConstructionRule::PacketSpanningMultipleFrames)
        );
        assert_eq!(
            DataFieldHeader::new(
                ConstructionRule::OctetStream,
                UslpProtocolId::UserDefinedOctetStream,
                Some(2),
            )
            .unwrap_err(),
            FhpLvoError(ConstructionRule::OctetStream)
        );
    }

    #[test]
    fn test_header_with_pointer() {
        let tfdh = DataFieldHeader::new(
            ConstructionRule::PacketSpanningMultipleFrames,
            UslpProtocolId::SpacePacketsOrEncapsulation,
            Some(0x1234),
        )
        .unwrap();
        let mut buf = [0; 4];
        assert_eq!(tfdh.write_to_bytes(&mut buf).unwrap(), 3);
        assert_eq!(buf, [0x00, 0x12, 0x34, 0x00]);
        assert_eq!(DataFieldHeader::from_bytes(&buf).unwrap(), tfdh);
    }

    #[test]
    fn test_header_without_pointer_reads_one_octet() {
        let tfdh = octet_stream_header();
        let mut buf = [0; 1];
        assert_eq!(tfdh.write_to_bytes(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0b111_00100);
        // A single octet is sufficient, nothing after it is interpreted as a pointer.
        assert_eq!(DataFieldHeader::from_bytes(&buf).unwrap(), tfdh);
        assert_eq!(
            DataFieldHeader::from_bytes(&[0b111_00100, 0xFF, 0xFF]).unwrap(),
            tfdh
        );
    }

    #[test]
    fn test_frame_data_field_header_from_bytes_too_small() {
        assert_eq!(
            DataFieldHeader::from_bytes(&[]).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::FromSliceTooSmall {
                found: 0,
                expected: 1
            })
        );
        assert_eq!(
            DataFieldHeader::from_bytes(&[0b000_00000, 0x01]).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::FromSliceTooSmall {
                found: 2,
                expected: 3
            })
        );
    }

    #[test]
    fn test_unassigned_protocol_ids() {
        for raw in [5, 6, 8, 30] {
            let tfdh = DataFieldHeader::from_bytes(&[0b111_00000 | raw]).unwrap();
            assert_eq!(tfdh.protocol_id(), raw);
            assert_eq!(tfdh.uslp_protocol_id(), None);
            assert_eq!(tfdh.construction_rule(), ConstructionRule::NoSegmentation);
            let mut buf = [0; 1];
            tfdh.write_to_bytes(&mut buf).unwrap();
            assert_eq!(buf[0], 0b111_00000 | raw);
            assert_eq!(
                DataFieldHeader::new_with_raw_protocol_id(ConstructionRule::NoSegmentation, raw, None)
                    .unwrap(),
                tfdh
            );
        }
        let tfdh = DataFieldHeader::new_with_raw_protocol_id(
            ConstructionRule::PacketSpanningMultipleFrames,
            0b11110,
            Some(7),
        )
        .unwrap();
        let mut buf = [0; 3];
        tfdh.write_to_bytes(&mut buf).unwrap();
        assert_eq!(buf, [0b000_11110, 0x00, 0x07]);
        assert_eq!(DataFieldHeader::from_bytes(&buf).unwrap(), tfdh);
    }

    #[test]
    fn test_protocol_id_width() {
        assert_eq!(
            DataFieldHeader::new_with_raw_protocol_id(ConstructionRule::NoSegmentation, 32, None)
                .unwrap_err(),
            UslpError::FieldOverflow(FieldOverflowError {
                field: "protocol ID",
                value: 32,
                width: 5
            })
        );
        assert_eq!(
            DataFieldHeader::new_with_raw_protocol_id(ConstructionRule::OctetStream, 3, Some(1))
                .unwrap_err(),
            UslpError::FhpLvo(FhpLvoError(ConstructionRule::OctetStream))
        );
        let too_wide = DataFieldHeader::WithoutPointer {
            rule: ConstructionRule::NoSegmentation,
            protocol_id: 0x20,
        };
        assert!(matches!(
            too_wide.write_to_bytes(&mut [0; 1]).unwrap_err(),
            UslpError::FieldOverflow(FieldOverflowError {
                field: "protocol ID",
                ..
            })
        ));
    }

    #[test]
    fn test_security_regions_from_slices() {
        let header = SecurityHeader::try_from(&[1, 2, 3, 4, 5, 6][..]).unwrap();
        assert_eq!(header.0, [1, 2, 3, 4, 5, 6]);
        assert_eq!(
            SecurityHeader::try_from(&[1, 2, 3][..]).unwrap_err(),
            ByteConversionError::FromSliceTooSmall {
                found: 3,
                expected: 6
            }
        );
        assert_eq!(
            SecurityHeader::try_from(&[0; 7][..]).unwrap_err(),
            ByteConversionError::InvalidLength {
                found: 7,
                expected: 6
            }
        );
        assert!(SecurityTrailer::try_from(&[0; 16][..]).is_ok());
        assert!(SecurityTrailer::try_from(&[0; 15][..]).is_err());
    }

    #[test]
    fn test_data_field_layout() {
        let data_field = DataField::new(
            SecurityHeader([0xA0; 6]),
            octet_stream_header(),
            &[1, 2, 3],
            SecurityTrailer([0xB0; 16]),
        );
        assert_eq!(data_field.len_overhead(), 23);
        let raw = data_field.to_vec().unwrap();
        assert_eq!(raw.len(), 26);
        assert_eq!(&raw[0..6], &[0xA0; 6]);
        assert_eq!(raw[6], 0b111_00100);
        assert_eq!(&raw[7..10], &[1, 2, 3]);
        assert_eq!(&raw[10..], &[0xB0; 16]);
        assert_eq!(DataField::from_bytes(&raw).unwrap(), data_field);
    }

    #[test]
    fn test_empty_data_zone() {
        let data_field = DataField::new(
            SecurityHeader::default(),
            DataFieldHeader::new(
                ConstructionRule::StartOfMapaSduOrVcaSdu,
                UslpProtocolId::SpacePacketsOrEncapsulation,
                Some(0xFFFF),
            )
            .unwrap(),
            &[],
            SecurityTrailer::default(),
        );
        let raw = data_field.to_vec().unwrap();
        assert_eq!(raw.len(), 25);
        let read_back = DataField::from_bytes(&raw).unwrap();
        assert!(read_back.data_zone.is_empty());
        assert_eq!(read_back, data_field);
    }

    #[test]
    fn test_data_field_truncated() {
        assert_eq!(
            DataField::from_bytes(&[0; 22]).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::FromSliceTooSmall {
                found: 22,
                expected: 23
            })
        );
        // Construction rule 0 needs a pointer, which does not fit in front of the trailer.
        let mut raw = [0; 24];
        raw[6] = 0b000_00000;
        assert_eq!(
            DataField::from_bytes(&raw).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::FromSliceTooSmall {
                found: 24,
                expected: 25
            })
        );
    }

    #[test]
    fn test_write_buf_too_small() {
        let data_field = DataField::new(
            SecurityHeader::default(),
            octet_stream_header(),
            &[1, 2, 3],
            SecurityTrailer::default(),
        );
        assert_eq!(
            data_field.write_to_bytes(&mut [0; 25]).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::ToSliceTooSmall {
                found: 25,
                expected: 26
            })
        );
    }
}
