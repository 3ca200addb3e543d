//! Engine configuration.

use crate::batch::{BatchConfig, MemoryConfig};
use crate::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_WORKERS, DEFAULT_UNIT_TIMEOUT_SECS};
use crate::processor::RetryPolicy;
use std::time::Duration;

/// Settings for a [`UnitEngine`](super::UnitEngine).
///
/// Usually built from a config file via
/// [`ConfigFile::load`](crate::config::ConfigFile::load); every field has a
/// default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker count used by [`process_text`](super::UnitEngine::process_text).
    pub max_workers: usize,
    /// How long the driver waits for one unit's result once it has started.
    pub unit_timeout: Duration,
    pub retry: RetryPolicy,
    pub batch: BatchConfig,
    pub memory: MemoryConfig,
    /// Texts longer than this many bytes are tried whole once, then split
    /// into chunks of at most this size if that fails.
    pub chunk_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            unit_timeout: Duration::from_secs(DEFAULT_UNIT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            batch: BatchConfig::default(),
            memory: MemoryConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
