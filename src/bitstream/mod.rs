//! Annex-B bitstream scanning
//!
//! Locates 4-byte start codes in raw encoder output and reports the units
//! between them as views into the caller's buffer. Nothing is copied until
//! the classifier keeps a parameter set.

use std::iter::FusedIterator;

mod classifier;

pub use classifier::ParameterSetClassifier;

/// Annex-B start code delimiting consecutive units
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Unit type values this crate cares about
pub mod unit_type {
    /// Sequence parameter set
    pub const SPS: u8 = 7;
    /// Picture parameter set
    pub const PPS: u8 = 8;
}

/// A unit found between two start codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawUnit<'a> {
    /// Offset of the start code in the scanned buffer
    pub offset: usize,

    /// Low 5 bits of the first payload byte
    pub unit_type: u8,

    /// Payload bytes, header byte included, start code excluded
    pub payload: &'a [u8],
}

impl<'a> RawUnit<'a> {
    /// Offset of the first payload byte in the scanned buffer
    pub fn payload_offset(&self) -> usize {
        self.offset + START_CODE.len()
    }

    /// Offset one past the last payload byte
    pub fn end(&self) -> usize {
        self.payload_offset() + self.payload.len()
    }

    /// Whether this unit is a sequence parameter set
    pub fn is_sps(&self) -> bool {
        self.unit_type == unit_type::SPS
    }
}

/// Lazy left-to-right scan over start-code-delimited units
#[derive(Debug, Clone)]
pub struct StartCodeScanner<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StartCodeScanner<'a> {
    /// Create a scanner starting at `from`
    pub fn new(buf: &'a [u8], from: usize) -> Self {
        Self { buf, pos: from }
    }

    /// Current scan position
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for StartCodeScanner<'a> {
    type Item = RawUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(offset) = find_start_code(self.buf, self.pos) else {
                self.pos = self.buf.len();
                return None;
            };
            let payload_start = offset + START_CODE.len();

            // A partial start code at the tail is part of the last payload
            let end = find_start_code(self.buf, payload_start).unwrap_or(self.buf.len());
            self.pos = end;

            // Back-to-back start codes carry no header byte
            if end > payload_start {
                let payload = &self.buf[payload_start..end];
                return Some(RawUnit {
                    offset,
                    unit_type: payload[0] & 0x1F,
                    payload,
                });
            }
        }
    }
}

impl FusedIterator for StartCodeScanner<'_> {}

/// Scan `buf` for units starting at `from`
pub fn scan(buf: &[u8], from: usize) -> StartCodeScanner<'_> {
    StartCodeScanner::new(buf, from)
}

/// Whether `buf` begins with a start code
pub fn starts_with_start_code(buf: &[u8]) -> bool {
    buf.starts_with(&START_CODE)
}

fn find_start_code(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(START_CODE.len())
        .position(|w| w == START_CODE)
        .map(|i| i + from)
}
