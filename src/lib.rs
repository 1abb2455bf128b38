//! H264 Config Core - parameter set discovery for live H.264 streaming
//!
//! This crate determines the SPS/PPS pair (and the profile-level-id derived
//! from it) that a device encoder produces at a given quality:
//! - Annex-B scanning and greedy SPS/PPS classification
//! - Streaming encoder probe and container recording probe
//! - Persistent per-quality cache of discovered configurations
//! - C exports for hosts that consume the result
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │           FFI Layer                  │
//! │  (C exports via #[no_mangle])        │
//! └─────────────────────────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────────────┐
//! │           Probe Module               │
//! │  (state machine, device sessions)    │
//! └─────────────────────────────────────┘
//!          │                 │
//!          ▼                 ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │  Cache Module   │ │ Bitstream/Config│
//! │ (quality keys)  │ │ (SPS/PPS, avcC) │
//! └─────────────────┘ └─────────────────┘
//!                  │
//!                  ▼
//! ┌─────────────────────────────────────┐
//! │        Threading Module              │
//! │  (recorder completion signal)        │
//! └─────────────────────────────────────┘
//! ```

pub mod bitstream;
pub mod cache;
pub mod config;
pub mod error;
pub mod ffi;
pub mod probe;
pub mod threading;

// Re-export main types
pub use cache::{CacheStatistics, DiscoveryCache, KeyValueStore, MemoryStore, QualityKey};
pub use config::CodecConfig;
pub use error::{Error, Result};
pub use probe::{ConfigSource, Discovery, ProbeConfig, Prober, Quality, Strategy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library (call once at startup)
pub fn init() {
    // Initialize logging with info level by default if RUST_LOG is not set
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();

    log::info!("H264 Config Core {} initialized", VERSION);
}
