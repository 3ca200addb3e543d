//! Memory governor: shrinks batch plans under resource pressure.
//!
//! Before each batch the governor takes a reading. When usage exceeds the
//! threshold it asks the sampler to reclaim memory, pauses briefly, and halves
//! the batch size for the rest of the job. This is approximate backpressure:
//! it lowers peak usage but does not bound it.

use super::planner::BatchPlan;
use super::sampler::ResourceSampler;
use crate::job::JobId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default memory threshold (1.5 GiB of resident memory).
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: u64 = 1536 * 1024 * 1024;

/// Default pause after a reclamation pass.
pub const DEFAULT_PRESSURE_PAUSE: Duration = Duration::from_millis(500);

/// Memory pressure settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Whether sampling happens at all.
    pub enabled: bool,
    /// Usage above this many bytes counts as pressure.
    pub threshold_bytes: u64,
    /// How long to pause after reclaiming.
    pub pause: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
            pause: DEFAULT_PRESSURE_PAUSE,
        }
    }
}

/// Non-fatal signal that a plan was shrunk because of pressure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourcePressure {
    pub used_bytes: u64,
    pub threshold_bytes: u64,
    pub previous_batch_size: usize,
    pub batch_size: usize,
}

/// Samples resource usage between batches and throttles the plan.
#[derive(Clone)]
pub struct MemoryGovernor {
    sampler: Arc<dyn ResourceSampler>,
    config: MemoryConfig,
}

impl MemoryGovernor {
    pub fn new(sampler: Arc<dyn ResourceSampler>, config: MemoryConfig) -> Self {
        Self { sampler, config }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Checks usage and shrinks `plan` if over the threshold.
    ///
    /// Never fails; returns the pressure signal when the plan was shrunk.
    pub async fn regulate(&self, job_id: &JobId, plan: &mut BatchPlan) -> Option<ResourcePressure> {
        if !self.config.enabled {
            return None;
        }

        let usage = self.sampler.sample();
        debug!(
            job_id = %job_id,
            memory_mb = usage.memory_mb(),
            batch_size = plan.batch_size(),
            "Sampled memory before batch"
        );
        if usage.memory_bytes <= self.config.threshold_bytes {
            return None;
        }

        self.sampler.reclaim();
        if !self.config.pause.is_zero() {
            tokio::time::sleep(self.config.pause).await;
        }

        let previous_batch_size = plan.batch_size();
        let batch_size = plan.halve();
        warn!(
            job_id = %job_id,
            memory_mb = usage.memory_mb(),
            threshold_mb = self.config.threshold_bytes / 1024 / 1024,
            previous_batch_size,
            batch_size,
            "Memory pressure, shrinking batches"
        );

        Some(ResourcePressure {
            used_bytes: usage.memory_bytes,
            threshold_bytes: self.config.threshold_bytes,
            previous_batch_size,
            batch_size,
        })
    }
}

impl std::fmt::Debug for MemoryGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGovernor")
            .field("config", &self.config)
            .finish()
    }
}
