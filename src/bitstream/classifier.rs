//! Parameter set classification
//!
//! Greedy and order tolerant: every type 7 unit replaces the held SPS, and the
//! first unit of any other type seen while no PPS is held is taken as the
//! PPS. Both rules stop applying once the pair is complete. Encoders
//! disagree on parameter set ordering and on how they split them across
//! output buffers, so nothing about either is assumed.

use super::{scan, unit_type};

/// Accumulates at most one SPS and one PPS across read chunks
#[derive(Debug, Clone, Default)]
pub struct ParameterSetClassifier {
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSetClassifier {
    /// Create an empty classifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify every unit in `chunk`, returning how many were kept.
    ///
    /// Once both sets are held the classifier is frozen and further input is
    /// ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        let mut kept = 0;

        for unit in scan(chunk, 0) {
            if self.is_complete() {
                break;
            }

            if unit.unit_type == unit_type::SPS {
                // Latest SPS wins until the PPS completes the pair
                if self.sps.is_some() {
                    log::debug!("Replacing SPS ({} bytes)", unit.payload.len());
                } else {
                    log::debug!("SPS found ({} bytes)", unit.payload.len());
                }
                self.sps = Some(unit.payload.to_vec());
                kept += 1;
            } else if self.pps.is_none() {
                if unit.unit_type != unit_type::PPS {
                    log::debug!(
                        "Taking unit of type {} as PPS ({} bytes)",
                        unit.unit_type,
                        unit.payload.len()
                    );
                } else {
                    log::debug!("PPS found ({} bytes)", unit.payload.len());
                }
                self.pps = Some(unit.payload.to_vec());
                kept += 1;
            }
        }

        kept
    }

    /// Whether both parameter sets are held
    pub fn is_complete(&self) -> bool {
        self.sps.is_some() && self.pps.is_some()
    }

    /// SPS bytes, if found
    pub fn sps(&self) -> Option<&[u8]> {
        self.sps.as_deref()
    }

    /// PPS bytes, if found
    pub fn pps(&self) -> Option<&[u8]> {
        self.pps.as_deref()
    }

    /// Take both parameter sets, or `None` if either is missing
    pub fn into_parts(self) -> Option<(Vec<u8>, Vec<u8>)> {
        match (self.sps, self.pps) {
            (Some(sps), Some(pps)) => Some((sps, pps)),
            _ => None,
        }
    }
}
