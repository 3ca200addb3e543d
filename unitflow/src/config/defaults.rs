//! Default values for every configuration setting.

use super::settings::*;
use crate::batch::{
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_MEMORY_THRESHOLD_BYTES, DEFAULT_MIN_BATCH_SIZE,
    DEFAULT_PRESSURE_PAUSE,
};
use crate::processor::{DEFAULT_BACKOFF_STEP, DEFAULT_MAX_ATTEMPTS};

// =============================================================================
// Engine
// =============================================================================

/// Default workers per job; keeps a rate-limited provider from being flooded.
pub const DEFAULT_MAX_WORKERS: usize = 3;

/// Upper bound on workers per job.
pub const MAX_WORKERS: usize = 64;

/// Default time to wait for a started unit's result.
pub const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Source
// =============================================================================

/// Default chunk size in bytes for plain text.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Clamps the worker count to `1..=MAX_WORKERS`, warning when it changes.
pub(super) fn clamp_max_workers(value: usize) -> usize {
    let clamped = value.clamp(1, MAX_WORKERS);
    if clamped != value {
        tracing::warn!(
            requested = value,
            max = MAX_WORKERS,
            "max_workers out of range, clamping to {}",
            clamped
        );
    }
    clamped
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            engine: EngineSettings {
                max_workers: DEFAULT_MAX_WORKERS,
                unit_timeout_secs: DEFAULT_UNIT_TIMEOUT_SECS,
            },
            retry: RetrySettings {
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                backoff_step_ms: DEFAULT_BACKOFF_STEP.as_millis() as u64,
            },
            batch: BatchSettings {
                max_batch_size: DEFAULT_MAX_BATCH_SIZE,
                min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            },
            memory: MemorySettings {
                enabled: true,
                threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
                pause_ms: DEFAULT_PRESSURE_PAUSE.as_millis() as u64,
            },
            source: SourceSettings {
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
        }
    }
}
