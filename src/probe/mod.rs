//! Probe state machine
//!
//! Resolves the codec configuration for an encoder at a given quality:
//!
//! ```text
//! CacheCheck ──hit──▶ CacheHit
//!     │
//!    miss
//!     ▼
//!  Probing ──▶ Succeeded
//!     │
//!     └──────▶ Failed
//! ```
//!
//! Probing blocks for up to several seconds and must not run on a
//! latency-sensitive thread. Probes are serialized on the capture device:
//! the device lock is held from acquisition until every resource the probe
//! opened has been released and the result is cached. The cache is checked
//! again once the lock is held, so concurrent callers for one quality probe
//! once.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{DiscoveryCache, QualityKey, StrategyPrefix};
use crate::config::CodecConfig;
use crate::error::{Error, Result};

mod config;
pub mod device;
mod encoder;
mod recorder;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use config::ProbeConfig;
pub use device::{
    CaptureDevice, EncoderFactory, EncoderFormat, EncoderInput, FrameCallback, InfoListener,
    OutputFormat, Recorder, RecorderFactory, RecorderInfo, RecorderSettings, VideoEncoder,
    VideoSource, AVC_MIME,
};
pub use recorder::TEST_FILE_NAME;

/// Requested capture quality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quality {
    /// Encoder codec name (streaming probe) or capture path identity
    pub encoder_identity: String,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    /// Bits per second
    pub bitrate: u32,
}

impl Quality {
    pub fn new(
        encoder_identity: impl Into<String>,
        width: u32,
        height: u32,
        framerate: u32,
        bitrate: u32,
    ) -> Self {
        Self {
            encoder_identity: encoder_identity.into(),
            width,
            height,
            framerate,
            bitrate,
        }
    }
}

/// Streaming encoder probe parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderParams {
    /// Raw frame color format the encoder is fed
    pub color_format: u32,
}

/// Container recording probe parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderParams {
    /// Directory for the throwaway recording
    pub scratch_dir: PathBuf,
}

/// Probing strategy, chosen by which encoder API the host uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    HardwareEncoder(EncoderParams),
    ContainerRecorder(RecorderParams),
}

impl Strategy {
    pub fn prefix(&self) -> StrategyPrefix {
        match self {
            Strategy::HardwareEncoder(_) => StrategyPrefix::MediaCodec,
            Strategy::ContainerRecorder(_) => StrategyPrefix::MediaRecorder,
        }
    }

    /// Cache key for `quality` under this strategy
    pub fn cache_key(&self, quality: &Quality) -> QualityKey {
        QualityKey::new(
            self.prefix(),
            quality.encoder_identity.clone(),
            quality.framerate,
            quality.width,
            quality.height,
        )
    }
}

/// Probe state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    CacheCheck,
    CacheHit,
    Probing,
    Succeeded,
    Failed,
}

impl ProbeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProbeState::CacheHit | ProbeState::Succeeded | ProbeState::Failed
        )
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Cache,
    Probe,
}

/// Result of a successful discovery
#[derive(Debug)]
pub struct Discovery {
    pub config: CodecConfig,
    pub source: ConfigSource,
    /// Non-fatal failures while releasing probe resources
    pub cleanup_failures: Vec<Error>,
}

/// Codec configuration discovery over a capture device
pub struct Prober {
    device: Mutex<Box<dyn CaptureDevice>>,
    encoders: Option<Arc<dyn EncoderFactory>>,
    recorders: Option<Arc<dyn RecorderFactory>>,
    cache: Option<Arc<DiscoveryCache>>,
    config: ProbeConfig,
    state: Mutex<ProbeState>,
}

impl Prober {
    pub fn new(device: Box<dyn CaptureDevice>, config: ProbeConfig) -> Self {
        Self {
            device: Mutex::new(device),
            encoders: None,
            recorders: None,
            cache: None,
            config,
            state: Mutex::new(ProbeState::Idle),
        }
    }

    /// Factory used by the streaming encoder strategy
    pub fn with_encoder_factory(mut self, factory: Arc<dyn EncoderFactory>) -> Self {
        self.encoders = Some(factory);
        self
    }

    /// Factory used by the container recording strategy
    pub fn with_recorder_factory(mut self, factory: Arc<dyn RecorderFactory>) -> Self {
        self.recorders = Some(factory);
        self
    }

    pub fn with_cache(mut self, cache: Arc<DiscoveryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Resolve the configuration for `quality`, probing on a cache miss.
    pub fn discover(&self, quality: &Quality, strategy: &Strategy) -> Result<Discovery> {
        let key = strategy.cache_key(quality);
        self.transition(ProbeState::CacheCheck, &key);

        if let Some(discovery) = self.cached(&key) {
            return Ok(discovery);
        }

        // Held until every probe resource is released and the result is cached
        let mut device = self.device.lock();

        // Another caller may have probed this quality while we waited
        if let Some(discovery) = self.cached(&key) {
            return Ok(discovery);
        }

        self.transition(ProbeState::Probing, &key);
        log::info!("Probing {} ({} bps)", key, quality.bitrate);

        match self.run_strategy(&mut **device, quality, strategy) {
            Ok((config, cleanup_failures)) => {
                self.transition(ProbeState::Succeeded, &key);
                log::info!(
                    "Probe succeeded for {}: profile-level-id={}",
                    key,
                    config.profile_level_id_hex()
                );
                if let Some(cache) = &self.cache {
                    cache.put(&key, &config);
                }
                Ok(Discovery {
                    config,
                    source: ConfigSource::Probe,
                    cleanup_failures,
                })
            }
            Err(e) => {
                self.transition(ProbeState::Failed, &key);
                log::warn!("Probe failed for {}: {}", key, e);
                Err(e)
            }
        }
    }

    /// [`Prober::discover`] without the report
    pub fn codec_config(&self, quality: &Quality, strategy: &Strategy) -> Result<CodecConfig> {
        self.discover(quality, strategy).map(|d| d.config)
    }

    /// State of the current or last discovery
    pub fn state(&self) -> ProbeState {
        *self.state.lock()
    }

    pub fn cache(&self) -> Option<&DiscoveryCache> {
        self.cache.as_deref()
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    fn cached(&self, key: &QualityKey) -> Option<Discovery> {
        let config = self.cache.as_ref()?.get(key)?;
        self.transition(ProbeState::CacheHit, key);
        log::info!("Using cached configuration for {}", key);
        Some(Discovery {
            config,
            source: ConfigSource::Cache,
            cleanup_failures: Vec::new(),
        })
    }

    fn run_strategy(
        &self,
        device: &mut dyn CaptureDevice,
        quality: &Quality,
        strategy: &Strategy,
    ) -> Result<(CodecConfig, Vec<Error>)> {
        match strategy {
            Strategy::HardwareEncoder(params) => {
                let factory = self.encoders.as_deref().ok_or_else(|| {
                    Error::DeviceUnavailable("no encoder factory configured".to_string())
                })?;
                encoder::probe(device, factory, quality, params, &self.config)
            }
            Strategy::ContainerRecorder(params) => {
                let factory = self.recorders.as_deref().ok_or_else(|| {
                    Error::DeviceUnavailable("no recorder factory configured".to_string())
                })?;
                recorder::probe(device, factory, quality, params, &self.config)
            }
        }
    }

    fn transition(&self, next: ProbeState, key: &QualityKey) {
        let mut state = self.state.lock();
        log::debug!("{}: {} -> {}", key, *state, next);
        *state = next;
    }
}

impl fmt::Debug for Prober {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prober")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}
