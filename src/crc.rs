//! CRC engine used for frame error control.
//!
//! This crate places a 4 octet frame error control field, which the default calculator
//! [crate::uslp::Crc32Fecf] fills with [CRC_32_FECF].

/// CRC-32 (ISO-HDLC, as used by IEEE 802.3) using [crc::Table<1>] as the CRC implementation.
pub const CRC_32_FECF: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
