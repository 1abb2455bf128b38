//! Discovery cache module
//!
//! Remembers the codec configuration found for an encoder at a given quality
//! so a probe only ever runs once per (strategy, encoder, quality) key. The
//! cache is advisory: store errors and corrupt entries read as misses.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::CodecConfig;

/// Store key prefix identifying the probing strategy.
///
/// Results from the two strategies are not interchangeable, so they never
/// share keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyPrefix {
    /// Streaming encoder probe
    MediaCodec,
    /// Container recording probe
    MediaRecorder,
}

impl StrategyPrefix {
    /// Prefix text used in store keys
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyPrefix::MediaCodec => "h264-mc",
            StrategyPrefix::MediaRecorder => "h264-mr",
        }
    }
}

impl fmt::Display for StrategyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key: strategy, encoder identity and quality tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualityKey {
    pub prefix: StrategyPrefix,
    pub encoder_identity: String,
    pub framerate: u32,
    pub width: u32,
    pub height: u32,
}

impl QualityKey {
    pub fn new(
        prefix: StrategyPrefix,
        encoder_identity: impl Into<String>,
        framerate: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            prefix,
            encoder_identity: encoder_identity.into(),
            framerate,
            width,
            height,
        }
    }

    /// `<framerate>,<width>,<height>`
    pub fn quality(&self) -> String {
        format!("{},{},{}", self.framerate, self.width, self.height)
    }

    /// `<prefix>-<encoder identity>-<framerate>,<width>,<height>`
    pub fn store_key(&self) -> String {
        format!("{}-{}-{}", self.prefix, self.encoder_identity, self.quality())
    }
}

impl fmt::Display for QualityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.store_key())
    }
}

/// Persistent text key-value store.
///
/// `put` stages a value; `commit` makes staged values durable and must not
/// return before they are.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn put(&self, key: &str, value: &str) -> io::Result<()>;

    fn commit(&self) -> io::Result<()>;
}

/// In-memory store, for tests and hosts without persistence
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    staged: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> io::Result<()> {
        self.staged.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn commit(&self) -> io::Result<()> {
        let mut staged = self.staged.write();
        self.entries.write().extend(staged.drain());
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStatistics {
    /// Lookups answered from the store
    pub hit_count: u64,

    /// Lookups that found nothing usable
    pub miss_count: u64,

    /// Successful writes
    pub store_count: u64,

    /// Store I/O errors and corrupt entries
    pub error_count: u64,
}

impl CacheStatistics {
    /// Total lookups
    pub fn total_lookups(&self) -> u64 {
        self.hit_count + self.miss_count
    }

    /// Hit rate (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            return 0.0;
        }
        self.hit_count as f64 / total as f64
    }
}

/// Codec configuration cache over a [`KeyValueStore`]
pub struct DiscoveryCache {
    store: Arc<dyn KeyValueStore>,

    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    errors: AtomicU64,
}

impl DiscoveryCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Look up a configuration. Never probes.
    pub fn get(&self, key: &QualityKey) -> Option<CodecConfig> {
        let store_key = key.store_key();

        let text = match self.store.get(&store_key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                log::warn!("Cache lookup failed for {}: {}", store_key, e);
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match CodecConfig::from_cache_text(&text) {
            Ok(config) => {
                log::debug!("Cache hit for {}", store_key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(config)
            }
            Err(e) => {
                log::warn!("Ignoring corrupt cache entry {}: {}", store_key, e);
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a configuration and commit it before returning.
    ///
    /// Store errors are logged and counted, never propagated.
    pub fn put(&self, key: &QualityKey, config: &CodecConfig) {
        let store_key = key.store_key();
        let result = self
            .store
            .put(&store_key, &config.to_cache_text())
            .and_then(|_| self.store.commit());

        match result {
            Ok(()) => {
                log::debug!("Cached configuration for {}", store_key);
                self.stores.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                log::warn!("Could not cache configuration for {}: {}", store_key, e);
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get statistics
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            store_count: self.stores.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryCache")
            .field("statistics", &self.statistics())
            .finish()
    }
}
