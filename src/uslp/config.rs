//! Mission configuration of the transfer frame codec.
//!
//! The configuration is a plain value which is validated once and then bound into a
//! [crate::uslp::FrameCodec]. It is never mutated by the codec.
use super::{ConfigurationError, SourceOrDestField, USLP_VERSION_NUMBER};
use crate::bits::max_value_for_width;

/// Width of the virtual channel frame count field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameCountWidth {
    /// The width in octets equals the 3-bit VC frame count length selector of each frame,
    /// as specified by CCSDS 732.1-B.
    FromSelector,
    /// Mission-fixed width in octets (1 to 8). The selector is carried as a plain field.
    Fixed {
        /// Width of the frame count field in octets.
        octets: u8,
    },
}

impl FrameCountWidth {
    /// Width of the frame count field in octets for a frame with the given selector value.
    #[inline]
    pub const fn octets(&self, selector: u8) -> usize {
        match self {
            FrameCountWidth::FromSelector => (selector & 0b111) as usize,
            FrameCountWidth::Fixed { octets } => *octets as usize,
        }
    }

    /// Selector value written when the caller does not pick one for a frame count of `count`.
    ///
    /// For a fixed width this is the configured octet count, capped at the 3-bit maximum of
    /// seven. Otherwise it is the smallest octet count which holds `count`.
    #[inline]
    pub const fn default_selector(&self, count: u64) -> u8 {
        let octets = match self {
            FrameCountWidth::FromSelector => (64 - count.leading_zeros() as u8 + 7) / 8,
            FrameCountWidth::Fixed { octets } => *octets,
        };
        if octets > 7 {
            7
        } else {
            octets
        }
    }
}

impl Default for FrameCountWidth {
    fn default() -> Self {
        FrameCountWidth::Fixed { octets: 4 }
    }
}

/// Handling of a non-zero spare field when decoding a primary header.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpareCheck {
    /// Log a warning and pass the value through.
    #[default]
    Lenient,
    /// Reject the frame.
    Strict,
}

/// Mission-wide parameters shared by all frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MissionConfig {
    /// Transfer frame version number, 4 bits.
    pub protocol_version: u8,
    /// Spacecraft ID.
    pub spacecraft_id: u16,
    /// Whether the spacecraft ID names the source or the destination.
    pub source_or_dest_field: SourceOrDestField,
    /// MAP ID, 4 bits.
    pub map_id: u8,
    /// Length of the insert zone in octets. Zero means the insert zone is absent.
    pub insert_zone_len: usize,
    /// Whether frames carry a frame error control field.
    pub fecf_enabled: bool,
    /// Width of the VC frame count field.
    pub frame_count_width: FrameCountWidth,
    /// Handling of a non-zero spare field on decode.
    pub spare_check: SpareCheck,
}

impl MissionConfig {
    /// Configuration with the USLP version number, source SCID semantics, MAP ID 0, no insert
    /// zone, no FECF, a 32 bit frame count and lenient spare checking.
    pub const fn new(spacecraft_id: u16) -> Self {
        Self {
            protocol_version: USLP_VERSION_NUMBER,
            spacecraft_id,
            source_or_dest_field: SourceOrDestField::Source,
            map_id: 0,
            insert_zone_len: 0,
            fecf_enabled: false,
            frame_count_width: FrameCountWidth::Fixed { octets: 4 },
            spare_check: SpareCheck::Lenient,
        }
    }

    /// Set the transfer frame version number.
    pub const fn with_protocol_version(mut self, protocol_version: u8) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    /// Set the source or destination identifier.
    pub const fn with_source_or_dest_field(mut self, field: SourceOrDestField) -> Self {
        self.source_or_dest_field = field;
        self
    }

    /// Set the MAP ID.
    pub const fn with_map_id(mut self, map_id: u8) -> Self {
        self.map_id = map_id;
        self
    }

    /// Set the insert zone length.
    pub const fn with_insert_zone_len(mut self, insert_zone_len: usize) -> Self {
        self.insert_zone_len = insert_zone_len;
        self
    }

    /// Enable or disable the frame error control field.
    pub const fn with_fecf(mut self, enabled: bool) -> Self {
        self.fecf_enabled = enabled;
        self
    }

    /// Set the width of the VC frame count field.
    pub const fn with_frame_count_width(mut self, width: FrameCountWidth) -> Self {
        self.frame_count_width = width;
        self
    }

    /// Set the spare field handling.
    pub const fn with_spare_check(mut self, spare_check: SpareCheck) -> Self {
        self.spare_check = spare_check;
        self
    }

    /// Check that all configured values fit their fields.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_config_width("protocol version", self.protocol_version as u64, 4)?;
        check_config_width("MAP ID", self.map_id as u64, 4)?;
        if let FrameCountWidth::Fixed { octets } = self.frame_count_width {
            if octets == 0 || octets > 8 {
                return Err(ConfigurationError::InvalidFrameCountWidth(octets));
            }
        }
        Ok(())
    }
}

fn check_config_width(
    field: &'static str,
    value: u64,
    width: usize,
) -> Result<(), ConfigurationError> {
    if value > max_value_for_width(width) {
        return Err(ConfigurationError::FieldTooWide {
            field,
            value,
            width,
        });
    }
    Ok(())
}
