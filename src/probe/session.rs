//! Scoped capture device ownership
//!
//! `DeviceSession` records the device state found at the start of a probe and
//! puts it back when the session ends, whichever way the probe exits.

use std::thread;
use std::time::Duration;

use super::device::CaptureDevice;
use crate::error::{Error, Result};

pub(crate) struct DeviceSession<'a> {
    device: &'a mut dyn CaptureDevice,
    saved_flash: bool,
    was_open: bool,
    was_previewing: bool,
    opened_here: bool,
    lent_to_recorder: bool,
    failures: Vec<Error>,
    finished: bool,
}

impl<'a> DeviceSession<'a> {
    /// Take the device for a probe, suppressing the flash and opening it if needed
    pub(crate) fn acquire(device: &'a mut dyn CaptureDevice) -> Result<Self> {
        let saved_flash = device.flash_enabled();
        let was_open = device.is_open();
        let was_previewing = was_open && device.is_previewing();

        let mut session = Self {
            device,
            saved_flash,
            was_open,
            was_previewing,
            opened_here: false,
            lent_to_recorder: false,
            failures: Vec::new(),
            finished: false,
        };

        // Keep the light off while probing
        if saved_flash {
            session
                .device
                .set_flash_enabled(false)
                .map_err(|e| Error::unavailable("disable flash", e))?;
        }

        if !was_open {
            session
                .device
                .open()
                .map_err(|e| Error::unavailable("open capture device", e))?;
            session.opened_here = true;
        }

        log::debug!(
            "Device acquired (was_open={}, was_previewing={}, flash={})",
            was_open,
            was_previewing,
            saved_flash
        );
        Ok(session)
    }

    pub(crate) fn device(&mut self) -> &mut dyn CaptureDevice {
        &mut *self.device
    }

    /// Start the preview unless it is already running
    pub(crate) fn ensure_preview(&mut self) -> Result<()> {
        if self.device.is_previewing() {
            return Ok(());
        }
        self.device
            .start_preview()
            .map_err(|e| Error::unavailable("start preview", e))
    }

    /// Remove the raw frame callback
    pub(crate) fn clear_frame_callback(&mut self) {
        self.device.set_frame_callback(None);
    }

    /// Stop the preview and unlock the device so a recorder can use it
    pub(crate) fn lend_to_recorder(&mut self, settle: Duration) -> Result<()> {
        if self.device.is_previewing() {
            if let Err(e) = self.device.lock() {
                log::debug!("Lock before stopping preview failed: {}", e);
            }
            if let Err(e) = self.device.stop_preview() {
                log::debug!("Stopping preview failed: {}", e);
            }
        }

        if !settle.is_zero() {
            thread::sleep(settle);
        }

        self.device
            .unlock()
            .map_err(|e| Error::unavailable("unlock capture device", e))?;
        self.lent_to_recorder = true;
        Ok(())
    }

    /// Restore the device and return the cleanup failures seen
    pub(crate) fn finish(mut self) -> Vec<Error> {
        self.restore();
        std::mem::take(&mut self.failures)
    }

    fn restore(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.clear_frame_callback();

        if self.lent_to_recorder {
            let result = self.device.lock();
            self.record("lock capture device", result);
        }

        if self.opened_here {
            let result = self.device.close();
            self.record("close capture device", result);
        } else if self.was_open {
            if self.was_previewing && !self.device.is_previewing() {
                let result = self.device.start_preview();
                self.record("restart preview", result);
            } else if !self.was_previewing && self.device.is_previewing() {
                let result = self.device.stop_preview();
                self.record("stop preview", result);
            }
        }

        if self.saved_flash {
            let result = self.device.set_flash_enabled(true);
            self.record("restore flash", result);
        }
    }

    fn record(&mut self, what: &str, result: Result<()>) {
        if let Err(e) = result {
            let failure = Error::cleanup(what, e);
            log::warn!("{}", failure);
            self.failures.push(failure);
        }
    }
}

impl Drop for DeviceSession<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
