//! Transfer frame assembly and slicing.
use super::regions::{check_fecf, check_ocf, fecf_len, ocf_len, FECF_LEN, OCF_LEN};
use super::{
    BypassSequenceControlFlag, ConfigurationError, DataField, FecfCalculator,
    FrameErrorControlField, InsertZone, MissionConfig, OperationalControlField, PrimaryHeader,
    ProtocolControlCommandFlag, UslpError,
};
use alloc::vec::Vec;

/// Complete USLP transfer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransferFrame {
    /// Primary header.
    pub primary_header: PrimaryHeader,
    /// Insert zone. Empty if the mission does not use one.
    pub insert_zone: InsertZone,
    /// Transfer frame data field.
    pub data_field: DataField,
    /// Operational control field, present if the OCF flag is set.
    pub ocf: Option<OperationalControlField>,
    /// Frame error control field, present if the mission enables it.
    pub fecf: Option<FrameErrorControlField>,
}

impl TransferFrame {
    /// Data contained in the transfer frame data zone.
    #[inline]
    pub fn data_zone(&self) -> &[u8] {
        &self.data_field.data_zone
    }

    /// Length of the entire frame as declared by the primary header.
    #[inline]
    pub fn len_frame(&self) -> usize {
        self.primary_header.len_frame()
    }
}

/// Per-frame inputs of [FrameCodec::build_frame]. Mission parameters come from the
/// [MissionConfig].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameParams {
    /// Virtual channel ID, 6 bits.
    pub vc_id: u8,
    /// End of frame primary header flag.
    pub end_of_header_flag: bool,
    /// Bypass sequence control flag.
    pub sequence_control_flag: BypassSequenceControlFlag,
    /// Protocol control command flag.
    pub protocol_control_command_flag: ProtocolControlCommandFlag,
    /// VC frame count length selector. If unset, [crate::uslp::FrameCountWidth::default_selector]
    /// picks it from the mission configuration.
    pub vc_frame_count_len: Option<u8>,
    /// VC frame count, usually supplied by a [crate::seq_count::VcFrameCountProvider].
    pub vc_frame_count: u64,
    /// Insert zone contents.
    pub insert_zone: InsertZone,
}

impl FrameParams {
    /// Parameters for a sequence controlled user data frame with a frame count of zero and no
    /// insert zone.
    pub fn new(vc_id: u8) -> Self {
        Self {
            vc_id,
            end_of_header_flag: false,
            sequence_control_flag: BypassSequenceControlFlag::SequenceControlledQoS,
            protocol_control_command_flag: ProtocolControlCommandFlag::TfdfContainsUserData,
            vc_frame_count_len: None,
            vc_frame_count: 0,
            insert_zone: InsertZone::default(),
        }
    }

    /// Set the end of frame primary header flag.
    pub fn with_end_of_header_flag(mut self, flag: bool) -> Self {
        self.end_of_header_flag = flag;
        self
    }

    /// Set the bypass sequence control flag.
    pub fn with_sequence_control_flag(mut self, flag: BypassSequenceControlFlag) -> Self {
        self.sequence_control_flag = flag;
        self
    }

    /// Set the protocol control command flag.
    pub fn with_protocol_control_command_flag(mut self, flag: ProtocolControlCommandFlag) -> Self {
        self.protocol_control_command_flag = flag;
        self
    }

    /// Set the VC frame count length selector and the VC frame count.
    pub fn with_frame_count(mut self, len: u8, count: u64) -> Self {
        self.vc_frame_count_len = Some(len);
        self.vc_frame_count = count;
        self
    }

    /// Set the VC frame count and leave the length selector to the mission configuration.
    pub fn with_vc_frame_count(mut self, count: u64) -> Self {
        self.vc_frame_count = count;
        self
    }

    /// Set the insert zone contents.
    pub fn with_insert_zone(mut self, insert_zone: &[u8]) -> Self {
        self.insert_zone = InsertZone::new(insert_zone);
        self
    }
}

/// Stateless transfer frame encoder and decoder bound to one [MissionConfig].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameCodec {
    config: MissionConfig,
}

impl FrameCodec {
    /// Validate and bind the mission configuration.
    pub fn new(config: MissionConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Mission configuration used by this codec.
    #[inline]
    pub fn config(&self) -> &MissionConfig {
        &self.config
    }

    /// Build a frame from per-frame parameters and the mission configuration.
    ///
    /// The OCF flag is set if an operational control field is supplied and the frame length
    /// field is set according to the regions of the frame. The FECF is left empty, it is either
    /// assigned by the caller or computed with [Self::encode_with_fecf].
    pub fn build_frame(
        &self,
        params: &FrameParams,
        data_field: DataField,
        ocf: Option<OperationalControlField>,
    ) -> Result<TransferFrame, UslpError> {
        params.insert_zone.check_len(&self.config)?;
        let mut primary_header = PrimaryHeader::new(&self.config, params.vc_id);
        primary_header.end_of_header_flag = params.end_of_header_flag;
        primary_header.sequence_control_flag = params.sequence_control_flag;
        primary_header.protocol_control_command_flag = params.protocol_control_command_flag;
        primary_header.vc_frame_count_len = params.vc_frame_count_len.unwrap_or(
            self.config
                .frame_count_width
                .default_selector(params.vc_frame_count),
        );
        primary_header.vc_frame_count = params.vc_frame_count;
        primary_header.ocf_flag = ocf.is_some();
        primary_header.validate(&self.config)?;
        let mut frame = TransferFrame {
            primary_header,
            insert_zone: params.insert_zone.clone(),
            data_field,
            ocf,
            fecf: None,
        };
        let len = self.len_written(&frame);
        frame.primary_header.set_frame_len(len)?;
        Ok(frame)
    }

    /// Length of the frame when written to bytes.
    pub fn len_written(&self, frame: &TransferFrame) -> usize {
        frame.primary_header.len_header(&self.config)
            + frame.insert_zone.len()
            + frame.data_field.len_written()
            + ocf_len(frame.primary_header.ocf_flag)
            + fecf_len(&self.config)
    }

    /// Encode a frame, placing the FECF supplied with the frame.
    ///
    /// The frame length field is recomputed from the actual regions of the frame. Nothing is
    /// emitted if any region fails validation.
    pub fn encode(&self, frame: &TransferFrame) -> Result<Vec<u8>, UslpError> {
        self.encode_frame(frame, None)
    }

    /// Encode a frame, placing a FECF computed by `calculator` over all preceding octets.
    pub fn encode_with_fecf(
        &self,
        frame: &TransferFrame,
        calculator: &impl FecfCalculator,
    ) -> Result<Vec<u8>, UslpError> {
        self.encode_frame(frame, Some(calculator))
    }

    fn encode_frame(
        &self,
        frame: &TransferFrame,
        calculator: Option<&dyn FecfCalculator>,
    ) -> Result<Vec<u8>, UslpError> {
        check_ocf(frame.primary_header.ocf_flag, frame.ocf.as_ref())?;
        frame.insert_zone.check_len(&self.config)?;
        check_fecf(&self.config, frame.fecf.is_some() || calculator.is_some())?;

        // Provisional body without header and FECF.
        let mut body = Vec::with_capacity(self.len_written(frame));
        body.extend_from_slice(frame.insert_zone.as_slice());
        body.extend_from_slice(&frame.data_field.to_vec()?);
        if let Some(ocf) = &frame.ocf {
            body.extend_from_slice(&ocf.0);
        }

        let mut primary_header = frame.primary_header;
        let total_len =
            primary_header.len_header(&self.config) + body.len() + fecf_len(&self.config);
        primary_header.set_frame_len(total_len)?;
        let mut raw = primary_header.to_vec(&self.config)?;
        raw.reserve_exact(total_len - raw.len());
        raw.extend_from_slice(&body);

        if self.config.fecf_enabled {
            let fecf = match (calculator, frame.fecf) {
                (Some(calculator), _) => {
                    let fecf = calculator.compute(&raw);
                    tracing::trace!(fecf = ?fecf.0, "substituted computed FECF");
                    fecf
                }
                (None, Some(fecf)) => fecf,
                (None, None) => return Err(ConfigurationError::MissingFecf.into()),
            };
            raw.extend_from_slice(&fecf.0);
        }
        debug_assert_eq!(raw.len(), total_len);
        tracing::debug!(
            vc_id = primary_header.vc_id,
            frame_len = total_len,
            data_zone_len = frame.data_field.data_zone.len(),
            "encoded transfer frame"
        );
        Ok(raw)
    }

    /// Decode a complete frame.
    ///
    /// The buffer must contain exactly one frame. The FECF is returned as received, see
    /// [Self::decode_verified] for checksum verification.
    pub fn decode(&self, buf: &[u8]) -> Result<TransferFrame, UslpError> {
        let primary_header = PrimaryHeader::from_bytes(&self.config, buf)?;
        if primary_header.len_frame() != buf.len() {
            return Err(UslpError::LengthMismatch {
                declared: primary_header.len_frame(),
                actual: buf.len(),
            });
        }
        let header_len = primary_header.len_header(&self.config);
        let ocf_len = ocf_len(primary_header.ocf_flag);
        let fecf_len = fecf_len(&self.config);
        let fixed_len = header_len + self.config.insert_zone_len + ocf_len + fecf_len;
        if buf.len() < fixed_len {
            return Err(UslpError::Underflow {
                frame_len: buf.len(),
                fixed_len,
            });
        }
        let data_field_start = header_len + self.config.insert_zone_len;
        let ocf_start = buf.len() - fecf_len - ocf_len;
        let insert_zone = InsertZone::new(&buf[header_len..data_field_start]);
        let data_field = DataField::from_bytes(&buf[data_field_start..ocf_start])?;
        let ocf = if primary_header.ocf_flag {
            Some(OperationalControlField::try_from(
                &buf[ocf_start..ocf_start + OCF_LEN],
            )?)
        } else {
            None
        };
        let fecf = if self.config.fecf_enabled {
            Some(FrameErrorControlField::try_from(
                &buf[buf.len() - FECF_LEN..],
            )?)
        } else {
            None
        };
        tracing::debug!(
            vc_id = primary_header.vc_id,
            frame_len = buf.len(),
            data_zone_len = data_field.data_zone.len(),
            "decoded transfer frame"
        );
        Ok(TransferFrame {
            primary_header,
            insert_zone,
            data_field,
            ocf,
            fecf,
        })
    }

    /// Decode a complete frame and verify its FECF against the value computed by `calculator`.
    pub fn decode_verified(
        &self,
        buf: &[u8],
        calculator: &impl FecfCalculator,
    ) -> Result<TransferFrame, UslpError> {
        let frame = self.decode(buf)?;
        let found = frame.fecf.ok_or(ConfigurationError::MissingFecf)?;
        let expected = calculator.compute(&buf[0..buf.len() - FECF_LEN]);
        if found != expected {
            return Err(UslpError::ChecksumFailure {
                found: found.0,
                expected: expected.0,
            });
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uslp::{
        ConstructionRule, Crc32Fecf, DataFieldHeader, FrameCountWidth, SecurityHeader,
        SecurityTrailer, SourceOrDestField, UslpProtocolId,
    };
    use crate::ByteConversionError;

    fn user_data_field(data: &[u8]) -> DataField {
        DataField::new(
            SecurityHeader::default(),
            DataFieldHeader::new(
                ConstructionRule::NoSegmentation,
                UslpProtocolId::UserDefinedOctetStream,
                None,
            )
            .unwrap(),
            data,
            SecurityTrailer::default(),
        )
    }

    fn basic_codec(fecf: bool) -> FrameCodec {
        FrameCodec::new(
            MissionConfig::new(0x1234)
                .with_map_id(0b0101)
                .with_fecf(fecf),
        )
        .unwrap()
    }

    #[test]
    fn test_frame_creator() {
        let codec = basic_codec(false);
        let data = [1, 2, 3, 4];
        let frame = codec
            .build_frame(
                &FrameParams::new(0b101010).with_frame_count(4, 20),
                user_data_field(&data),
                None,
            )
            .unwrap();
        // 11 header octets, 6 + 1 + 4 + 16 data field octets.
        assert_eq!(codec.len_written(&frame), 38);
        assert_eq!(frame.len_frame(), 38);
        assert!(!frame.primary_header.ocf_flag);
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(raw.len(), 38);
        assert_eq!(u16::from_be_bytes([raw[4], raw[5]]), 37);
        assert_eq!(&raw[18..22], &data);
        let reader = codec.decode(&raw).unwrap();
        assert_eq!(reader, frame);
        assert_eq!(reader.data_zone(), &data);
        assert!(reader.ocf.is_none());
        assert!(reader.fecf.is_none());
    }

    #[test]
    fn test_frame_creator_with_op_ctrl() {
        let codec = basic_codec(false);
        let frame = codec
            .build_frame(
                &FrameParams::new(0b101010),
                user_data_field(&[1, 2, 3, 4]),
                Some(OperationalControlField::from(4)),
            )
            .unwrap();
        assert!(frame.primary_header.ocf_flag);
        assert_eq!(codec.len_written(&frame), 42);
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(raw.len(), 42);
        assert_eq!(&raw[38..42], &[0, 0, 0, 4]);
        let reader = codec.decode(&raw).unwrap();
        assert_eq!(reader.ocf.unwrap().value(), 4);
        assert_eq!(reader, frame);
    }

    #[test]
    fn test_supplied_fecf_round_trip() {
        let codec = basic_codec(true);
        let mut frame = codec
            .build_frame(&FrameParams::new(1), user_data_field(&[0x42]), None)
            .unwrap();
        frame.fecf = Some(FrameErrorControlField([0xDE, 0xAD, 0xBE, 0xEF]));
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(raw.len(), frame.len_frame());
        assert_eq!(&raw[raw.len() - 4..], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(codec.decode(&raw).unwrap(), frame);
    }

    #[test]
    fn test_computed_fecf() {
        let codec = basic_codec(true);
        let frame = codec
            .build_frame(&FrameParams::new(1), user_data_field(&[0x42]), None)
            .unwrap();
        let raw = codec.encode_with_fecf(&frame, &Crc32Fecf).unwrap();
        let crc = crate::crc::CRC_32_FECF.checksum(&raw[0..raw.len() - 4]);
        assert_eq!(&raw[raw.len() - 4..], &crc.to_be_bytes());
        let reader = codec.decode_verified(&raw, &Crc32Fecf).unwrap();
        assert_eq!(reader.fecf.unwrap().0, crc.to_be_bytes());
        assert_eq!(reader.data_zone(), &[0x42]);
    }

    #[test]
    fn test_frame_parser_invalid_checksum() {
        let codec = basic_codec(true);
        let frame = codec
            .build_frame(&FrameParams::new(1), user_data_field(&[0x42]), None)
            .unwrap();
        let mut raw = codec.encode_with_fecf(&frame, &Crc32Fecf).unwrap();
        let data_idx = raw.len() - 4 - 16 - 1;
        raw[data_idx] ^= 0xFF;
        // Plain decoding passes the received FECF through.
        codec.decode(&raw).unwrap();
        match codec.decode_verified(&raw, &Crc32Fecf) {
            Ok(_) => panic!("transfer frame read call did not fail"),
            Err(UslpError::ChecksumFailure { found, expected }) => {
                assert_eq!(&found, &raw[raw.len() - 4..]);
                assert_ne!(found, expected);
            }
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    #[test]
    fn test_ocf_flag_mismatch() {
        let codec = basic_codec(false);
        let mut frame = codec
            .build_frame(&FrameParams::new(1), user_data_field(&[]), None)
            .unwrap();
        frame.ocf = Some(OperationalControlField::default());
        assert_eq!(
            codec.encode(&frame).unwrap_err(),
            UslpError::Configuration(ConfigurationError::OcfWithoutFlag)
        );
        frame.ocf = None;
        frame.primary_header.ocf_flag = true;
        assert_eq!(
            codec.encode(&frame).unwrap_err(),
            UslpError::Configuration(ConfigurationError::OcfFlagWithoutOcf)
        );
    }

    #[test]
    fn test_fecf_toggle_mismatch() {
        let disabled = basic_codec(false);
        let mut frame = disabled
            .build_frame(&FrameParams::new(1), user_data_field(&[]), None)
            .unwrap();
        assert_eq!(
            disabled.encode_with_fecf(&frame, &Crc32Fecf).unwrap_err(),
            UslpError::Configuration(ConfigurationError::FecfWhileDisabled)
        );
        frame.fecf = Some(FrameErrorControlField::default());
        assert_eq!(
            disabled.encode(&frame).unwrap_err(),
            UslpError::Configuration(ConfigurationError::FecfWhileDisabled)
        );
        let enabled = basic_codec(true);
        let frame = enabled
            .build_frame(&FrameParams::new(1), user_data_field(&[]), None)
            .unwrap();
        assert_eq!(
            enabled.encode(&frame).unwrap_err(),
            UslpError::Configuration(ConfigurationError::MissingFecf)
        );
        let raw = enabled.encode_with_fecf(&frame, &Crc32Fecf).unwrap();
        assert_eq!(
            disabled.decode_verified(&raw[..raw.len() - 4], &Crc32Fecf).unwrap_err(),
            UslpError::LengthMismatch {
                declared: raw.len(),
                actual: raw.len() - 4
            }
        );
    }

    #[test]
    fn test_insert_zone() {
        let codec = FrameCodec::new(MissionConfig::new(7).with_insert_zone_len(2)).unwrap();
        let params = FrameParams::new(3).with_insert_zone(&[0xAA, 0xBB]);
        let frame = codec
            .build_frame(&params, user_data_field(&[9]), None)
            .unwrap();
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(&raw[11..13], &[0xAA, 0xBB]);
        let reader = codec.decode(&raw).unwrap();
        assert_eq!(reader.insert_zone.as_slice(), &[0xAA, 0xBB]);
        assert_eq!(reader, frame);

        assert_eq!(
            codec
                .build_frame(&FrameParams::new(3), user_data_field(&[9]), None)
                .unwrap_err(),
            UslpError::Configuration(ConfigurationError::InsertZoneLength {
                found: 0,
                expected: 2
            })
        );
    }

    #[test]
    fn test_length_mismatch() {
        let codec = basic_codec(false);
        let frame = codec
            .build_frame(&FrameParams::new(1), user_data_field(&[1, 2]), None)
            .unwrap();
        let mut raw = codec.encode(&frame).unwrap();
        raw.push(0);
        assert_eq!(
            codec.decode(&raw).unwrap_err(),
            UslpError::LengthMismatch {
                declared: raw.len() - 1,
                actual: raw.len()
            }
        );
    }

    #[test]
    fn test_underflow() {
        let codec = FrameCodec::new(MissionConfig::new(1).with_insert_zone_len(8).with_fecf(true))
            .unwrap();
        let mut primary_header = PrimaryHeader::new(codec.config(), 1);
        primary_header.ocf_flag = true;
        // Header and insert zone fit, OCF and FECF do not.
        primary_header.set_frame_len(20).unwrap();
        let mut raw = primary_header.to_vec(codec.config()).unwrap();
        raw.resize(20, 0);
        assert_eq!(
            codec.decode(&raw).unwrap_err(),
            UslpError::Underflow {
                frame_len: 20,
                fixed_len: 27
            }
        );
    }

    #[test]
    fn test_frame_parser_data_field_truncated() {
        let codec = basic_codec(false);
        let mut primary_header = PrimaryHeader::new(codec.config(), 1);
        primary_header.set_frame_len(15).unwrap();
        let mut raw = primary_header.to_vec(codec.config()).unwrap();
        raw.resize(15, 0);
        assert_eq!(
            codec.decode(&raw).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::FromSliceTooSmall {
                found: 4,
                expected: 23
            })
        );
    }

    #[test]
    fn test_frame_parser_buf_too_small() {
        let codec = basic_codec(false);
        let frame = codec
            .build_frame(&FrameParams::new(1), user_data_field(&[0x42]), None)
            .unwrap();
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(
            codec.decode(&raw[0..7]).unwrap_err(),
            UslpError::ByteConversion(ByteConversionError::FromSliceTooSmall {
                found: 7,
                expected: 11
            })
        );
    }

    #[test]
    fn test_frame_count_from_selector() {
        let codec = FrameCodec::new(
            MissionConfig::new(0x2A)
                .with_source_or_dest_field(SourceOrDestField::Dest)
                .with_frame_count_width(FrameCountWidth::FromSelector),
        )
        .unwrap();
        let frame = codec
            .build_frame(
                &FrameParams::new(5)
                    .with_frame_count(2, 0x1234)
                    .with_end_of_header_flag(true)
                    .with_sequence_control_flag(BypassSequenceControlFlag::ExpeditedQoS),
                user_data_field(&[1]),
                None,
            )
            .unwrap();
        assert_eq!(frame.primary_header.len_header(codec.config()), 9);
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(raw.len(), 9 + 24);
        assert_eq!(codec.decode(&raw).unwrap(), frame);
        assert!(codec
            .build_frame(
                &FrameParams::new(5).with_frame_count(1, 0x100),
                user_data_field(&[1]),
                None,
            )
            .is_err());
    }

    #[test]
    fn test_default_selector_matches_count_width() {
        let codec = FrameCodec::new(MissionConfig::new(0x2A)).unwrap();
        let frame = codec
            .build_frame(
                &FrameParams::new(1).with_vc_frame_count(0x0102_0304),
                user_data_field(&[1, 2]),
                None,
            )
            .unwrap();
        assert_eq!(frame.primary_header.vc_frame_count_len, 4);
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(raw[6] & 0b111, 4);
        assert_eq!(&raw[7..11], &[1, 2, 3, 4]);

        // The same octets read with the width taken from the selector.
        let selector_codec = FrameCodec::new(
            MissionConfig::new(0x2A).with_frame_count_width(FrameCountWidth::FromSelector),
        )
        .unwrap();
        let read_back = selector_codec.decode(&raw).unwrap();
        assert_eq!(read_back, frame);
        assert_eq!(read_back.primary_header.vc_frame_count, 0x0102_0304);
        assert_eq!(read_back.data_zone(), &[1, 2]);
    }

    #[test]
    fn test_selector_sized_to_count() {
        let codec = FrameCodec::new(
            MissionConfig::new(0x2A).with_frame_count_width(FrameCountWidth::FromSelector),
        )
        .unwrap();
        let frame = codec
            .build_frame(
                &FrameParams::new(1).with_vc_frame_count(0x1FF),
                user_data_field(&[]),
                None,
            )
            .unwrap();
        assert_eq!(frame.primary_header.vc_frame_count_len, 2);
        assert_eq!(frame.primary_header.len_header(codec.config()), 9);
        let raw = codec.encode(&frame).unwrap();
        assert_eq!(codec.decode(&raw).unwrap(), frame);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert_eq!(
            FrameCodec::new(
                MissionConfig::new(1).with_frame_count_width(FrameCountWidth::Fixed { octets: 0 })
            )
            .unwrap_err(),
            ConfigurationError::InvalidFrameCountWidth(0)
        );
    }
}
