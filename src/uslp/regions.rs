//! Opaque frame regions: insert zone, operational control field and frame error control field.
//!
//! The codec never interprets the contents of these regions. It only places them and checks
//! their presence against the frame flags and the [MissionConfig].
use super::data_field::fixed_region;
use super::{ConfigurationError, MissionConfig};
use crate::ByteConversionError;
use alloc::vec::Vec;

/// Length of the operational control field.
pub const OCF_LEN: usize = 4;
/// Length of the frame error control field.
pub const FECF_LEN: usize = 4;

/// Insert zone, an opaque region of mission-fixed length directly after the primary header.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsertZone(pub Vec<u8>);

impl InsertZone {
    /// Copy the passed octets into a new insert zone.
    pub fn new(data: &[u8]) -> Self {
        Self(data.to_vec())
    }

    /// Length in octets.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// An empty insert zone is absent from the frame.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw octets.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Check the length against the mission-configured insert zone length.
    pub fn check_len(&self, config: &MissionConfig) -> Result<(), ConfigurationError> {
        if self.len() != config.insert_zone_len {
            return Err(ConfigurationError::InsertZoneLength {
                found: self.len(),
                expected: config.insert_zone_len,
            });
        }
        Ok(())
    }
}

/// Operational control field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OperationalControlField(pub [u8; OCF_LEN]);

impl OperationalControlField {
    /// Big endian value of the field.
    #[inline]
    pub const fn value(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl From<u32> for OperationalControlField {
    fn from(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl TryFrom<&[u8]> for OperationalControlField {
    type Error = ByteConversionError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        fixed_region(value).map(Self)
    }
}

/// Frame error control field.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameErrorControlField(pub [u8; FECF_LEN]);

impl TryFrom<&[u8]> for FrameErrorControlField {
    type Error = ByteConversionError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        fixed_region(value).map(Self)
    }
}

/// Computes the frame error control field over all octets preceding it.
///
/// Any `Fn(&[u8]) -> [u8; 4]` closure can be used as a calculator.
pub trait FecfCalculator {
    /// Compute the FECF for the passed frame octets, excluding the FECF itself.
    fn compute(&self, frame: &[u8]) -> FrameErrorControlField;
}

impl<F: Fn(&[u8]) -> [u8; FECF_LEN]> FecfCalculator for F {
    fn compute(&self, frame: &[u8]) -> FrameErrorControlField {
        FrameErrorControlField(self(frame))
    }
}

/// Default calculator which places a big endian [crate::crc::CRC_32_FECF] checksum.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Crc32Fecf;

impl FecfCalculator for Crc32Fecf {
    fn compute(&self, frame: &[u8]) -> FrameErrorControlField {
        FrameErrorControlField(crate::crc::CRC_32_FECF.checksum(frame).to_be_bytes())
    }
}

/// Check the OCF against the OCF flag of the primary header.
pub fn check_ocf(
    ocf_flag: bool,
    ocf: Option<&OperationalControlField>,
) -> Result<(), ConfigurationError> {
    match (ocf_flag, ocf) {
        (false, Some(_)) => Err(ConfigurationError::OcfWithoutFlag),
        (true, None) => Err(ConfigurationError::OcfFlagWithoutOcf),
        _ => Ok(()),
    }
}

/// Check the presence of a FECF source against the mission FECF toggle.
///
/// `has_source` is true if either FECF octets or a calculator are available.
pub fn check_fecf(config: &MissionConfig, has_source: bool) -> Result<(), ConfigurationError> {
    match (config.fecf_enabled, has_source) {
        (false, true) => Err(ConfigurationError::FecfWhileDisabled),
        (true, false) => Err(ConfigurationError::MissingFecf),
        _ => Ok(()),
    }
}

/// Length of the OCF region for the given flag.
#[inline]
pub const fn ocf_len(ocf_flag: bool) -> usize {
    if ocf_flag {
        OCF_LEN
    } else {
        0
    }
}

/// Length of the FECF region for the given mission.
#[inline]
pub const fn fecf_len(config: &MissionConfig) -> usize {
    if config.fecf_enabled {
        FECF_LEN
    } else {
        0
    }
}
