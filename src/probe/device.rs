//! Collaborator interfaces driven by the probe
//!
//! The capture device, the streaming encoder and the container recorder are
//! owned by the host platform. The probe only needs the operations below.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// MIME type requested from streaming encoders
pub const AVC_MIME: &str = "video/avc";

/// Receives raw frames in capture order
pub type FrameCallback = Box<dyn FnMut(&[u8]) + Send>;

/// Receives recorder info events, possibly from another thread
pub type InfoListener = Box<dyn Fn(RecorderInfo) + Send + Sync>;

/// Camera or other capture source
pub trait CaptureDevice: Send {
    fn is_open(&self) -> bool;

    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn is_previewing(&self) -> bool;

    fn start_preview(&mut self) -> Result<()>;

    fn stop_preview(&mut self) -> Result<()>;

    /// Reclaim the device after a recorder used it
    fn lock(&mut self) -> Result<()>;

    /// Let a recorder take the device
    fn unlock(&mut self) -> Result<()>;

    fn flash_enabled(&self) -> bool;

    fn set_flash_enabled(&mut self, enabled: bool) -> Result<()>;

    /// Install or remove the raw frame callback
    fn set_frame_callback(&mut self, callback: Option<FrameCallback>);
}

/// Streaming encoder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderFormat {
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub bitrate: u32,
    pub framerate: u32,
    pub color_format: u32,
    /// Seconds between I-frames
    pub i_frame_interval: u32,
}

/// Input side of a streaming encoder, shared with the capture callback
pub trait EncoderInput: Send + Sync {
    /// Queue one raw frame. `Ok(false)` means no input buffer was free.
    fn queue_frame(&self, frame: &[u8], pts_us: i64) -> Result<bool>;
}

/// Streaming (push/pull) encoder
pub trait VideoEncoder: Send {
    fn configure(&mut self, format: &EncoderFormat) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn input(&self) -> Arc<dyn EncoderInput>;

    /// Copy encoded output into `buf`, blocking until some is available.
    /// Returns the number of bytes written.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn stop(&mut self) -> Result<()>;

    /// Free the encoder instance and the hardware behind it
    fn release(&mut self);
}

/// Creates encoder instances by codec name
pub trait EncoderFactory: Send + Sync {
    fn create_by_name(&self, name: &str) -> Result<Box<dyn VideoEncoder>>;
}

/// Recorder video source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    Camera,
}

/// Recorder container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    ThreeGpp,
}

/// Container recorder configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderSettings {
    pub source: VideoSource,
    pub output_format: OutputFormat,
    pub max_duration: Duration,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub bitrate: u32,
    pub output_path: PathBuf,
}

/// Recorder info events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderInfo {
    MaxDurationReached,
    MaxFileSizeReached,
    Unknown(i32),
}

/// Recorder that manages its own encoder and writes a container file
pub trait Recorder: Send {
    fn configure(&mut self, settings: &RecorderSettings) -> Result<()>;

    fn set_info_listener(&mut self, listener: InfoListener);

    fn prepare(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn release(&mut self);
}

/// Creates recorder instances bound to the capture device
pub trait RecorderFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Recorder>>;
}
