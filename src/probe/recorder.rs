//! Container recording probe
//!
//! Records a short clip through a recorder that runs its own encoder, then
//! reads the parameter sets back out of the file it wrote.

use std::path::{Path, PathBuf};
use std::thread;

use super::config::ProbeConfig;
use super::device::{
    CaptureDevice, OutputFormat, Recorder, RecorderFactory, RecorderInfo, RecorderSettings,
    VideoSource,
};
use super::session::DeviceSession;
use super::{Quality, RecorderParams};
use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::threading::CompletionSignal;

/// Name of the throwaway recording inside the scratch directory
pub const TEST_FILE_NAME: &str = "h264-probe-test.3gp";

/// Owns a recorder instance and guarantees it is stopped and released once
struct RecorderSession {
    recorder: Box<dyn Recorder>,
    started: bool,
    released: bool,
}

impl RecorderSession {
    fn create(factory: &dyn RecorderFactory) -> Result<Self> {
        let recorder = factory
            .create()
            .map_err(|e| Error::unavailable("create recorder", e))?;
        Ok(Self {
            recorder,
            started: false,
            released: false,
        })
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // The recorder may already have stopped itself at max duration
        if self.started {
            if let Err(e) = self.recorder.stop() {
                log::debug!("Recorder stop failed: {}", e);
            }
        }
        self.recorder.release();
        log::debug!("Recorder released");
    }
}

impl Drop for RecorderSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Throwaway recording, deleted when dropped if not removed explicitly
struct ScratchFile {
    path: PathBuf,
    removed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn remove(mut self) -> Option<Error> {
        self.delete()
    }

    fn delete(&mut self) -> Option<Error> {
        if self.removed {
            return None;
        }
        self.removed = true;

        match std::fs::remove_file(&self.path) {
            Ok(()) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                let failure = Error::cleanup(&format!("delete {:?}", self.path), e);
                log::error!("Temp file could not be erased: {}", failure);
                Some(failure)
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.delete();
    }
}

/// Fails with `StorageUnavailable` unless `dir` is an existing directory
fn ensure_storage(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::StorageUnavailable(format!(
            "{:?} is not a directory",
            dir
        ))),
        Err(e) => Err(Error::StorageUnavailable(format!("{:?}: {}", dir, e))),
    }
}

/// Run the recording probe. Returns the configuration and any cleanup failures.
pub(crate) fn probe(
    device: &mut dyn CaptureDevice,
    factory: &dyn RecorderFactory,
    quality: &Quality,
    params: &RecorderParams,
    config: &ProbeConfig,
) -> Result<(CodecConfig, Vec<Error>)> {
    ensure_storage(&params.scratch_dir)?;

    let scratch = ScratchFile::new(params.scratch_dir.join(TEST_FILE_NAME));
    log::info!("Testing H264 support... test file at {:?}", scratch.path());

    let settings = RecorderSettings {
        source: VideoSource::Camera,
        output_format: OutputFormat::ThreeGpp,
        max_duration: config.recorder_max_duration,
        width: quality.width,
        height: quality.height,
        framerate: quality.framerate,
        bitrate: quality.bitrate,
        output_path: scratch.path().to_path_buf(),
    };

    let mut session = DeviceSession::acquire(device)?;
    let recorded = record(&mut session, factory, &settings, config);
    let mut failures = session.finish();
    recorded?;

    let codec_config = CodecConfig::from_container_file(scratch.path())?;
    failures.extend(scratch.remove());

    log::info!("H264 test succeeded");
    Ok((codec_config, failures))
}

fn record(
    session: &mut DeviceSession<'_>,
    factory: &dyn RecorderFactory,
    settings: &RecorderSettings,
    config: &ProbeConfig,
) -> Result<()> {
    session.lend_to_recorder(config.preview_settle)?;

    let mut recorder = RecorderSession::create(factory)?;
    let result = run(&mut recorder, settings, config);
    recorder.shutdown();
    result
}

fn run(
    session: &mut RecorderSession,
    settings: &RecorderSettings,
    config: &ProbeConfig,
) -> Result<()> {
    let recorder = &mut *session.recorder;
    recorder
        .configure(settings)
        .map_err(|e| Error::unavailable("configure recorder", e))?;

    let signal = CompletionSignal::new();
    let notifier = signal.notifier();
    recorder.set_info_listener(Box::new(move |info: RecorderInfo| {
        log::debug!("Recorder info: {:?}", info);
        notifier.notify();
    }));

    recorder
        .prepare()
        .map_err(|e| Error::unavailable("prepare recorder", e))?;
    recorder
        .start()
        .map_err(|e| Error::unavailable("start recorder", e))?;
    session.started = true;

    if signal.wait(config.completion_timeout) {
        log::debug!("Recorder completion received");
        thread::sleep(config.completion_settle);
    } else {
        log::debug!(
            "Recorder completion not received after {:?}, stopping anyway",
            config.completion_timeout
        );
    }

    Ok(())
}
