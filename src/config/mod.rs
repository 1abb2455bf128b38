//! Codec configuration value object
//!
//! A `CodecConfig` holds the SPS/PPS pair of an H.264 stream together with
//! the values text protocols need: the profile-level-id and the base64 forms
//! used in `sprop-parameter-sets`.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::bitstream::ParameterSetClassifier;
use crate::error::{Error, Result};

pub mod container;

/// Minimum SPS length: header byte plus profile, constraint and level bytes
const MIN_SPS_LEN: usize = 4;

/// Immutable H.264 codec configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    sps: Vec<u8>,
    pps: Vec<u8>,
    profile_level_id: u32,
    sps_base64: String,
    pps_base64: String,
}

impl CodecConfig {
    /// Build from raw SPS and PPS bytes (header byte included, no start code)
    pub fn from_raw_bytes(sps: Vec<u8>, pps: Vec<u8>) -> Result<Self> {
        if sps.len() < MIN_SPS_LEN {
            return Err(Error::InvalidFormat(format!(
                "SPS too short: {} bytes",
                sps.len()
            )));
        }
        if pps.is_empty() {
            return Err(Error::InvalidFormat("PPS is empty".to_string()));
        }

        let profile_level_id = u32::from_be_bytes([0, sps[1], sps[2], sps[3]]);
        let sps_base64 = BASE64.encode(&sps);
        let pps_base64 = BASE64.encode(&pps);

        Ok(Self {
            sps,
            pps,
            profile_level_id,
            sps_base64,
            pps_base64,
        })
    }

    /// Rebuild from cached base64 text and profile-level-id hex text.
    ///
    /// The profile-level-id must agree with the decoded SPS, otherwise the
    /// entry is rejected as corrupt.
    pub fn from_cached_text(sps_b64: &str, pps_b64: &str, profile_level_id: &str) -> Result<Self> {
        let sps = decode_base64("SPS", sps_b64)?;
        let pps = decode_base64("PPS", pps_b64)?;
        let expected = parse_profile_level_id(profile_level_id)?;

        let config = Self::from_raw_bytes(sps, pps)?;
        if config.profile_level_id != expected {
            return Err(Error::InvalidFormat(format!(
                "profile-level-id {} does not match SPS ({})",
                profile_level_id.trim(),
                config.profile_level_id_hex()
            )));
        }

        Ok(config)
    }

    /// Extract the parameter sets from a recorded MP4/3GP file's `avcC` record
    pub fn from_container_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (sps, pps) = container::read_parameter_sets(path)?;
        Self::from_raw_bytes(sps, pps)
    }

    /// Classify a complete Annex-B buffer and build from its parameter sets
    pub fn from_annex_b(data: &[u8]) -> Result<Self> {
        let mut classifier = ParameterSetClassifier::new();
        classifier.feed(data);

        let (sps, pps) = classifier.into_parts().ok_or_else(|| {
            Error::InvalidFormat("Annex-B buffer lacks an SPS or PPS".to_string())
        })?;
        Self::from_raw_bytes(sps, pps)
    }

    /// Parse a cache entry of the form `<profile-level-id>,<sps b64>,<pps b64>`
    pub fn from_cache_text(text: &str) -> Result<Self> {
        let mut fields = text.splitn(3, ',');
        match (fields.next(), fields.next(), fields.next()) {
            (Some(profile), Some(sps), Some(pps)) => Self::from_cached_text(sps, pps, profile),
            _ => Err(Error::InvalidFormat(format!(
                "cache entry has fewer than 3 fields: {:?}",
                text
            ))),
        }
    }

    /// Serialize as a cache entry, the inverse of [`CodecConfig::from_cache_text`]
    pub fn to_cache_text(&self) -> String {
        format!(
            "{},{},{}",
            self.profile_level_id_hex(),
            self.sps_base64,
            self.pps_base64
        )
    }

    /// SPS bytes
    pub fn sps(&self) -> &[u8] {
        &self.sps
    }

    /// PPS bytes
    pub fn pps(&self) -> &[u8] {
        &self.pps
    }

    /// 24-bit profile-level-id (SPS bytes 1..4, big-endian)
    pub fn profile_level_id(&self) -> u32 {
        self.profile_level_id
    }

    /// profile-level-id as six lowercase hex digits
    pub fn profile_level_id_hex(&self) -> String {
        format!("{:06x}", self.profile_level_id)
    }

    /// profile_idc
    pub fn profile_idc(&self) -> u8 {
        self.sps[1]
    }

    /// level_idc
    pub fn level_idc(&self) -> u8 {
        self.sps[3]
    }

    /// Base64 SPS, no line wrapping
    pub fn sps_base64(&self) -> &str {
        &self.sps_base64
    }

    /// Base64 PPS, no line wrapping
    pub fn pps_base64(&self) -> &str {
        &self.pps_base64
    }

    /// Value for the `sprop-parameter-sets` fmtp parameter
    pub fn sprop_parameter_sets(&self) -> String {
        format!("{},{}", self.sps_base64, self.pps_base64)
    }
}

fn decode_base64(what: &str, text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|e| Error::InvalidFormat(format!("{} has invalid base64 encoding: {}", what, e)))
}

fn parse_profile_level_id(text: &str) -> Result<u32> {
    let text = text.trim();
    let value = u32::from_str_radix(text, 16)
        .map_err(|e| Error::InvalidFormat(format!("bad profile-level-id {:?}: {}", text, e)))?;
    if value > 0x00FF_FFFF {
        return Err(Error::InvalidFormat(format!(
            "profile-level-id {:?} exceeds 24 bits",
            text
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::START_CODE;

    // Baseline profile, level 3.0
    const SPS: &[u8] = &[0x67, 0x42, 0x80, 0x1e, 0xda, 0x02, 0x80, 0xf6, 0x80, 0x6d];
    const PPS: &[u8] = &[0x68, 0xce, 0x06, 0xe2, 0x3c, 0x80];

    #[test]
    fn test_from_raw_bytes() {
        let config = CodecConfig::from_raw_bytes(SPS.to_vec(), PPS.to_vec()).unwrap();
        assert_eq!(config.profile_level_id(), 0x42801e);
        assert_eq!(config.profile_level_id_hex(), "42801e");
        assert_eq!(config.profile_idc(), 66);
        assert_eq!(config.level_idc(), 30);
        assert_eq!(config.sps_base64(), "Z0KAHtoCgPaAbQ==");
        assert_eq!(config.pps_base64(), "aM4G4jyA");
        assert_eq!(config.sprop_parameter_sets(), "Z0KAHtoCgPaAbQ==,aM4G4jyA");
    }

    #[test]
    fn test_rejects_short_or_empty_sets() {
        assert!(matches!(
            CodecConfig::from_raw_bytes(vec![0x67, 0x42], PPS.to_vec()),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            CodecConfig::from_raw_bytes(SPS.to_vec(), Vec::new()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_cache_text_round_trip() {
        let config = CodecConfig::from_raw_bytes(SPS.to_vec(), PPS.to_vec()).unwrap();
        let text = config.to_cache_text();
        assert_eq!(text, "42801e,Z0KAHtoCgPaAbQ==,aM4G4jyA");

        let restored = CodecConfig::from_cache_text(&text).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_cached_text_profile_mismatch() {
        let result = CodecConfig::from_cached_text("Z0KAHtoCgPaAbQ==", "aM4G4jyA", "64001f");
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_cached_text_bad_fields() {
        assert!(CodecConfig::from_cache_text("42801e,Z0KAHtoCgPaAbQ==").is_err());
        assert!(CodecConfig::from_cached_text("not base64!", "aM4G4jyA", "42801e").is_err());
        assert!(CodecConfig::from_cached_text("Z0KAHtoCgPaAbQ==", "aM4G4jyA", "zz").is_err());
        assert!(CodecConfig::from_cached_text("Z0KAHtoCgPaAbQ==", "aM4G4jyA", "1000000").is_err());
    }

    #[test]
    fn test_from_annex_b() {
        let mut data = Vec::new();
        data.extend_from_slice(&START_CODE);
        data.extend_from_slice(PPS);
        data.extend_from_slice(&START_CODE);
        data.extend_from_slice(SPS);

        let config = CodecConfig::from_annex_b(&data).unwrap();
        assert_eq!(config.sps(), SPS);
        assert_eq!(config.pps(), PPS);

        assert!(CodecConfig::from_annex_b(&data[..4 + PPS.len()]).is_err());
    }
}
