//! Probe configuration

use std::time::Duration;

/// Probe budgets and delays
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Encoder reads before giving up (streaming probe)
    pub max_reads: u32,

    /// Bytes drained from the encoder per read
    pub read_buffer_size: usize,

    /// Seconds between I-frames requested from the encoder
    pub i_frame_interval: u32,

    /// Optional wall-clock cap on the streaming probe
    pub time_budget: Option<Duration>,

    /// Length of the throwaway recording
    pub recorder_max_duration: Duration,

    /// How long to wait for the recorder's completion event
    pub completion_timeout: Duration,

    /// Extra recording time after the completion event
    pub completion_settle: Duration,

    /// Pause after stopping the preview, before handing the device over
    pub preview_settle: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_reads: 300,
            read_buffer_size: 2048,
            i_frame_interval: 4,
            time_budget: None,
            recorder_max_duration: Duration::from_secs(1),
            completion_timeout: Duration::from_secs(6),
            completion_settle: Duration::from_millis(400),
            preview_settle: Duration::from_millis(100),
        }
    }
}

impl ProbeConfig {
    /// Short delays for devices known to hand over quickly
    pub fn fast() -> Self {
        Self {
            completion_timeout: Duration::from_secs(3),
            completion_settle: Duration::from_millis(100),
            preview_settle: Duration::from_millis(20),
            ..Self::default()
        }
    }

    /// Larger read budget for encoders slow to emit parameter sets
    pub fn thorough() -> Self {
        Self {
            max_reads: 1000,
            read_buffer_size: 4096,
            time_budget: Some(Duration::from_secs(20)),
            recorder_max_duration: Duration::from_secs(2),
            completion_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }
}
