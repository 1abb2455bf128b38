//! In-memory collaborators for probe tests

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::device::{
    CaptureDevice, EncoderFactory, EncoderFormat, EncoderInput, FrameCallback, InfoListener,
    Recorder, RecorderFactory, RecorderInfo, RecorderSettings, VideoEncoder,
};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    pub open: bool,
    pub previewing: bool,
    pub flash: bool,
    pub opens: u32,
    pub closes: u32,
    pub preview_starts: u32,
    pub preview_stops: u32,
    pub locks: u32,
    pub unlocks: u32,
    pub flash_changes: Vec<bool>,
    pub has_callback: bool,
    pub fail_close: bool,
}

/// Test-side view of a [`FakeDevice`] after it moved into a prober
#[derive(Clone)]
pub(crate) struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
    callback: Arc<Mutex<Option<FrameCallback>>>,
}

impl DeviceHandle {
    pub fn state(&self) -> parking_lot::MutexGuard<'_, DeviceState> {
        self.state.lock()
    }

    /// Deliver one raw frame to the installed callback, if any
    pub fn emit_frame(&self, frame: &[u8]) {
        if let Some(callback) = self.callback.lock().as_mut() {
            callback(frame);
        }
    }
}

pub(crate) struct FakeDevice {
    handle: DeviceHandle,
}

impl FakeDevice {
    pub fn new() -> (Self, DeviceHandle) {
        let handle = DeviceHandle {
            state: Arc::new(Mutex::new(DeviceState::default())),
            callback: Arc::new(Mutex::new(None)),
        };
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    /// Device already open and previewing, with the flash on
    pub fn in_use() -> (Self, DeviceHandle) {
        let (device, handle) = Self::new();
        {
            let mut state = handle.state();
            state.open = true;
            state.previewing = true;
            state.flash = true;
        }
        (device, handle)
    }
}

impl CaptureDevice for FakeDevice {
    fn is_open(&self) -> bool {
        self.handle.state().open
    }

    fn open(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        state.closes += 1;
        if state.fail_close {
            return Err(Error::DeviceUnavailable("close refused".to_string()));
        }
        state.open = false;
        state.previewing = false;
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.handle.state().previewing
    }

    fn start_preview(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        state.previewing = true;
        state.preview_starts += 1;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        state.previewing = false;
        state.preview_stops += 1;
        Ok(())
    }

    fn lock(&mut self) -> Result<()> {
        self.handle.state().locks += 1;
        Ok(())
    }

    fn unlock(&mut self) -> Result<()> {
        self.handle.state().unlocks += 1;
        Ok(())
    }

    fn flash_enabled(&self) -> bool {
        self.handle.state().flash
    }

    fn set_flash_enabled(&mut self, enabled: bool) -> Result<()> {
        let mut state = self.handle.state();
        state.flash = enabled;
        state.flash_changes.push(enabled);
        Ok(())
    }

    fn set_frame_callback(&mut self, callback: Option<FrameCallback>) {
        self.handle.state().has_callback = callback.is_some();
        *self.handle.callback.lock() = callback;
    }
}

#[derive(Debug, Default)]
pub(crate) struct EncoderLog {
    pub created: Vec<String>,
    pub format: Option<EncoderFormat>,
    pub starts: u32,
    pub reads: u32,
    pub frames_queued: u32,
    pub stops: u32,
    pub releases: u32,
    /// Whether the device still had a frame callback at release
    pub callback_at_release: Option<bool>,
}

/// Encoder whose output is a fixed script of chunks followed by filler
#[derive(Clone)]
pub(crate) struct FakeEncoderFactory {
    script: Vec<Vec<u8>>,
    filler: Vec<u8>,
    fail_read_at: Option<u32>,
    read_delay: Duration,
    device: Option<DeviceHandle>,
    log: Arc<Mutex<EncoderLog>>,
}

impl FakeEncoderFactory {
    pub fn new(script: Vec<Vec<u8>>) -> Self {
        Self {
            script,
            // Slice data, never a start code
            filler: vec![0x21, 0x9a, 0x02, 0x04],
            fail_read_at: None,
            read_delay: Duration::ZERO,
            device: None,
            log: Arc::default(),
        }
    }

    /// Push one captured frame through `device` before every read
    pub fn with_frames_from(mut self, device: DeviceHandle) -> Self {
        self.device = Some(device);
        self
    }

    pub fn failing_read(mut self, read: u32) -> Self {
        self.fail_read_at = Some(read);
        self
    }

    /// Block every read for `delay`
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn log(&self) -> parking_lot::MutexGuard<'_, EncoderLog> {
        self.log.lock()
    }
}

impl EncoderFactory for FakeEncoderFactory {
    fn create_by_name(&self, name: &str) -> Result<Box<dyn VideoEncoder>> {
        self.log.lock().created.push(name.to_string());
        Ok(Box::new(FakeEncoder {
            factory: self.clone(),
        }))
    }
}

struct FakeEncoder {
    factory: FakeEncoderFactory,
}

struct FakeInput {
    log: Arc<Mutex<EncoderLog>>,
}

impl EncoderInput for FakeInput {
    fn queue_frame(&self, _frame: &[u8], _pts_us: i64) -> Result<bool> {
        self.log.lock().frames_queued += 1;
        Ok(true)
    }
}

impl VideoEncoder for FakeEncoder {
    fn configure(&mut self, format: &EncoderFormat) -> Result<()> {
        self.factory.log.lock().format = Some(format.clone());
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.factory.log.lock().starts += 1;
        Ok(())
    }

    fn input(&self) -> Arc<dyn EncoderInput> {
        Arc::new(FakeInput {
            log: self.factory.log.clone(),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reads = {
            let mut log = self.factory.log.lock();
            log.reads += 1;
            log.reads
        };
        if self.factory.fail_read_at == Some(reads) {
            return Err(Error::DeviceUnavailable("encoder died".to_string()));
        }
        if !self.factory.read_delay.is_zero() {
            thread::sleep(self.factory.read_delay);
        }

        if let Some(device) = &self.factory.device {
            device.emit_frame(&[0x80; 16]);
        }

        let chunk = self
            .factory
            .script
            .get(reads as usize - 1)
            .unwrap_or(&self.factory.filler);
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        Ok(len)
    }

    fn stop(&mut self) -> Result<()> {
        self.factory.log.lock().stops += 1;
        Ok(())
    }

    fn release(&mut self) {
        let callback = self
            .factory
            .device
            .as_ref()
            .map(|device| device.state().has_callback);

        let mut log = self.factory.log.lock();
        log.releases += 1;
        log.callback_at_release = callback;
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecorderLog {
    pub creates: u32,
    pub settings: Option<RecorderSettings>,
    pub prepares: u32,
    pub starts: u32,
    pub stops: u32,
    pub releases: u32,
}

/// Recorder that writes a prepared file when started
#[derive(Clone)]
pub(crate) struct FakeRecorderFactory {
    file: Option<Vec<u8>>,
    signal: bool,
    seal_dir: bool,
    log: Arc<Mutex<RecorderLog>>,
}

impl FakeRecorderFactory {
    /// Writes `file` and reports completion
    pub fn new(file: Vec<u8>) -> Self {
        Self {
            file: Some(file),
            signal: true,
            seal_dir: false,
            log: Arc::default(),
        }
    }

    /// Never writes anything
    pub fn empty() -> Self {
        Self {
            file: None,
            signal: true,
            seal_dir: false,
            log: Arc::default(),
        }
    }

    pub fn without_completion(mut self) -> Self {
        self.signal = false;
        self
    }

    /// Make the output directory read-only once the file is written
    pub fn sealing_output_dir(mut self) -> Self {
        self.seal_dir = true;
        self
    }

    pub fn log(&self) -> parking_lot::MutexGuard<'_, RecorderLog> {
        self.log.lock()
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn create(&self) -> Result<Box<dyn Recorder>> {
        self.log.lock().creates += 1;
        Ok(Box::new(FakeRecorder {
            factory: self.clone(),
            listener: None,
        }))
    }
}

struct FakeRecorder {
    factory: FakeRecorderFactory,
    listener: Option<InfoListener>,
}

impl Recorder for FakeRecorder {
    fn configure(&mut self, settings: &RecorderSettings) -> Result<()> {
        self.factory.log.lock().settings = Some(settings.clone());
        Ok(())
    }

    fn set_info_listener(&mut self, listener: InfoListener) {
        self.listener = Some(listener);
    }

    fn prepare(&mut self) -> Result<()> {
        self.factory.log.lock().prepares += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let path = {
            let mut log = self.factory.log.lock();
            log.starts += 1;
            log.settings.as_ref().map(|s| s.output_path.clone())
        };

        if let (Some(file), Some(path)) = (&self.factory.file, path) {
            std::fs::write(&path, file)?;
            if self.factory.seal_dir {
                if let Some(dir) = path.parent() {
                    set_read_only(dir, true)?;
                }
            }
        }

        if self.factory.signal {
            if let Some(listener) = self.listener.take() {
                thread::spawn(move || listener(RecorderInfo::MaxDurationReached));
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.factory.log.lock().stops += 1;
        Ok(())
    }

    fn release(&mut self) {
        self.factory.log.lock().releases += 1;
    }
}

/// Toggle write permission on `dir`
#[cfg(unix)]
pub(crate) fn set_read_only(dir: &std::path::Path, read_only: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if read_only { 0o555 } else { 0o755 };
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_read_only(dir: &std::path::Path, read_only: bool) -> std::io::Result<()> {
    let mut permissions = std::fs::metadata(dir)?.permissions();
    permissions.set_readonly(read_only);
    std::fs::set_permissions(dir, permissions)
}

/// Whether a read-only directory actually refuses new entries here.
/// Superusers bypass the check.
pub(crate) fn read_only_enforced() -> bool {
    let Ok(dir) = tempfile::tempdir() else {
        return false;
    };
    if set_read_only(dir.path(), true).is_err() {
        return false;
    }
    let enforced = std::fs::write(dir.path().join("check"), b"x").is_err();
    let _ = set_read_only(dir.path(), false);
    enforced
}
