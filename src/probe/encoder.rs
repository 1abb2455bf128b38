//! Streaming encoder probe
//!
//! Feeds captured frames to a streaming encoder and drains its output until
//! both parameter sets are seen or the read budget runs out.

use std::sync::Arc;
use std::time::Instant;

use super::config::ProbeConfig;
use super::device::{
    CaptureDevice, EncoderFactory, EncoderFormat, EncoderInput, VideoEncoder, AVC_MIME,
};
use super::session::DeviceSession;
use super::{EncoderParams, Quality};
use crate::bitstream::{starts_with_start_code, ParameterSetClassifier};
use crate::config::CodecConfig;
use crate::error::{Error, Result};

/// Owns an encoder instance and guarantees it is stopped and released once
struct EncoderSession {
    encoder: Box<dyn VideoEncoder>,
    started: bool,
    released: bool,
}

impl EncoderSession {
    fn create(factory: &dyn EncoderFactory, name: &str) -> Result<Self> {
        let encoder = factory
            .create_by_name(name)
            .map_err(|e| Error::unavailable(&format!("create encoder {}", name), e))?;
        Ok(Self {
            encoder,
            started: false,
            released: false,
        })
    }

    fn start(&mut self, format: &EncoderFormat) -> Result<Arc<dyn EncoderInput>> {
        self.encoder
            .configure(format)
            .map_err(|e| Error::unavailable("configure encoder", e))?;
        self.encoder
            .start()
            .map_err(|e| Error::unavailable("start encoder", e))?;
        self.started = true;
        Ok(self.encoder.input())
    }

    fn encoder(&mut self) -> &mut dyn VideoEncoder {
        &mut *self.encoder
    }

    fn finish(mut self) -> Vec<Error> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Vec<Error> {
        let mut failures = Vec::new();
        if self.released {
            return failures;
        }
        self.released = true;

        if self.started {
            if let Err(e) = self.encoder.stop() {
                let failure = Error::cleanup("stop encoder", e);
                log::warn!("{}", failure);
                failures.push(failure);
            }
        }
        self.encoder.release();
        log::debug!("Encoder released");
        failures
    }
}

impl Drop for EncoderSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Transient state of one streaming probe
struct ProbeAttempt {
    reads: u32,
    started: Instant,
    classifier: ParameterSetClassifier,
}

impl ProbeAttempt {
    fn new() -> Self {
        Self {
            reads: 0,
            started: Instant::now(),
            classifier: ParameterSetClassifier::new(),
        }
    }

    fn within_budget(&self, config: &ProbeConfig) -> bool {
        if self.reads >= config.max_reads {
            return false;
        }
        match config.time_budget {
            Some(budget) => self.started.elapsed() < budget,
            None => true,
        }
    }

    /// Drain the encoder until both parameter sets are held or the budget runs out
    fn drain(mut self, encoder: &mut dyn VideoEncoder, config: &ProbeConfig) -> Result<CodecConfig> {
        let mut buffer = vec![0u8; config.read_buffer_size];

        while !self.classifier.is_complete() && self.within_budget(config) {
            self.reads += 1;
            let len = encoder.read(&mut buffer)?.min(buffer.len());
            let chunk = &buffer[..len];
            log::trace!("Read {}: {} bytes", self.reads, len);

            if starts_with_start_code(chunk) {
                log::debug!("SPS or/and PPS candidate in read {}", self.reads);
                self.classifier.feed(chunk);
            }
        }

        log::debug!(
            "Encoder drained: {} reads in {:?}",
            self.reads,
            self.started.elapsed()
        );

        let reads = self.reads;
        let (sps, pps) = self
            .classifier
            .into_parts()
            .ok_or(Error::ParameterSetsNotFound { reads })?;
        CodecConfig::from_raw_bytes(sps, pps)
    }
}

/// Run the streaming probe. Returns the configuration and any cleanup failures.
pub(crate) fn probe(
    device: &mut dyn CaptureDevice,
    factory: &dyn EncoderFactory,
    quality: &Quality,
    params: &EncoderParams,
    config: &ProbeConfig,
) -> Result<(CodecConfig, Vec<Error>)> {
    let mut session = DeviceSession::acquire(device)?;
    session.ensure_preview()?;

    let mut encoder = EncoderSession::create(factory, &quality.encoder_identity)?;

    let format = EncoderFormat {
        mime: AVC_MIME.to_string(),
        width: quality.width,
        height: quality.height,
        bitrate: quality.bitrate,
        framerate: quality.framerate,
        color_format: params.color_format,
        i_frame_interval: config.i_frame_interval,
    };

    let result = run(&mut session, &mut encoder, &format, config);

    // No frame may reach the encoder once it is released
    session.clear_frame_callback();
    let mut failures = encoder.finish();
    failures.extend(session.finish());

    result.map(|codec_config| (codec_config, failures))
}

fn run(
    session: &mut DeviceSession<'_>,
    encoder: &mut EncoderSession,
    format: &EncoderFormat,
    config: &ProbeConfig,
) -> Result<CodecConfig> {
    let input = encoder.start(format)?;

    let epoch = Instant::now();
    session.device().set_frame_callback(Some(Box::new(move |frame: &[u8]| {
        let pts_us = epoch.elapsed().as_micros() as i64;
        match input.queue_frame(frame, pts_us) {
            Ok(true) => log::trace!("Queued frame: {} bytes", frame.len()),
            Ok(false) => log::debug!("No input buffer available, frame dropped"),
            Err(e) => log::trace!("Frame rejected by encoder: {}", e),
        }
    })));

    ProbeAttempt::new().drain(encoder.encoder(), config)
}
