//! Settings structs, one per `[section]` of the INI file.

use crate::batch::{BatchConfig, MemoryConfig};
use crate::engine::EngineConfig;
use crate::processor::RetryPolicy;
use std::time::Duration;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub engine: EngineSettings,
    pub retry: RetrySettings,
    pub batch: BatchSettings,
    pub memory: MemorySettings,
    pub source: SourceSettings,
}

/// `[engine]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Workers per job
    pub max_workers: usize,
    /// Seconds to wait for a started unit's result
    pub unit_timeout_secs: u64,
}

/// `[retry]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    /// Linear backoff step; attempt `n` waits `n * step`
    pub backoff_step_ms: u64,
}

/// `[batch]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    pub max_batch_size: usize,
    /// Floor for pressure halving
    pub min_batch_size: usize,
}

/// `[memory]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySettings {
    pub enabled: bool,
    pub threshold_bytes: u64,
    pub pause_ms: u64,
}

/// `[source]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// Plain text at least this many bytes long is chunked
    pub chunk_size: usize,
}

impl ConfigFile {
    /// Builds the engine configuration these settings describe.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_workers: self.engine.max_workers,
            unit_timeout: Duration::from_secs(self.engine.unit_timeout_secs),
            retry: RetryPolicy::new()
                .with_max_attempts(self.retry.max_attempts)
                .with_backoff_step(Duration::from_millis(self.retry.backoff_step_ms)),
            batch: BatchConfig {
                max_batch_size: self.batch.max_batch_size,
                min_batch_size: self.batch.min_batch_size,
            },
            memory: MemoryConfig {
                enabled: self.memory.enabled,
                threshold_bytes: self.memory.threshold_bytes,
                pause: Duration::from_millis(self.memory.pause_ms),
            },
            chunk_size: self.source.chunk_size,
        }
    }
}
