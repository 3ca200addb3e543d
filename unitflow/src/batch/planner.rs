//! Batch planning: how many units to dispatch together.

use crate::job::Unit;
use std::ops::Range;

// =============================================================================
// Batch Sizing Constants
// =============================================================================

/// Largest batch dispatched for small inputs.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 16;

/// Smallest batch size pressure can shrink a plan to.
pub const DEFAULT_MIN_BATCH_SIZE: usize = 2;

const KB: usize = 1024;
const MB: usize = 1024 * 1024;

/// Input-size tiers, largest first: (minimum total input bytes, batch size).
///
/// Larger jobs get smaller batches to bound how much unit content is held by
/// concurrently running workers.
const INPUT_SIZE_TIERS: &[(usize, usize)] = &[(8 * MB, 2), (2 * MB, 4), (512 * KB, 8)];

/// Unit-count tiers, largest first: (minimum unit count, batch size).
///
/// Very long jobs cap their batch size so a pressure signal takes effect
/// before most of the job has been dispatched.
const UNIT_COUNT_TIERS: &[(usize, usize)] = &[(256, 8), (64, 12)];

/// Batch sizing limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Upper bound on batch size.
    pub max_batch_size: usize,
    /// Floor that halving never goes below.
    pub min_batch_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
        }
    }
}

/// Ordered batches over a job's units.
///
/// Ranges are positions in the job's unit list (sorted by index), not unit
/// indices. The plan is consumed front to back; shrinking it only affects
/// batches that have not been handed out yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchPlan {
    total: usize,
    cursor: usize,
    batch_size: usize,
    floor: usize,
}

impl BatchPlan {
    /// Creates a plan over `total` units. `batch_size` and `floor` are
    /// clamped to at least 1.
    pub fn new(total: usize, batch_size: usize, floor: usize) -> Self {
        Self {
            total,
            cursor: 0,
            batch_size: batch_size.max(1),
            floor: floor.max(1),
        }
    }

    /// Returns the next batch and advances the plan.
    pub fn next_batch(&mut self) -> Option<Range<usize>> {
        if self.is_exhausted() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.total);
        let range = self.cursor..end;
        self.cursor = end;
        Some(range)
    }

    /// Halves the batch size for every remaining batch, never going below the
    /// floor (or above the current size). Returns the new size.
    pub fn halve(&mut self) -> usize {
        let halved = (self.batch_size / 2).max(self.floor);
        self.batch_size = halved.min(self.batch_size);
        self.batch_size
    }

    /// The batches still to be dispatched, at the current size.
    pub fn remaining_ranges(&self) -> Vec<Range<usize>> {
        (self.cursor..self.total)
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(self.total))
            .collect()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn floor(&self) -> usize {
        self.floor
    }

    /// Position of the first unit not yet handed out.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.total - self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.total
    }
}

/// Chooses the initial batch size for a job.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchPlanner {
    config: BatchConfig,
}

impl BatchPlanner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Batch size for a job with the given unit count and total input size.
    pub fn batch_size_for(&self, unit_count: usize, input_bytes: usize) -> usize {
        let by_input = INPUT_SIZE_TIERS
            .iter()
            .find(|(min_bytes, _)| input_bytes >= *min_bytes)
            .map(|(_, size)| *size)
            .unwrap_or(self.config.max_batch_size);

        let by_count = UNIT_COUNT_TIERS
            .iter()
            .find(|(min_units, _)| unit_count >= *min_units)
            .map(|(_, size)| *size)
            .unwrap_or(self.config.max_batch_size);

        by_input
            .min(by_count)
            .min(self.config.max_batch_size)
            .max(self.config.min_batch_size)
            .min(unit_count.max(1))
    }

    /// Plans batches for the given units.
    pub fn plan(&self, units: &[Unit]) -> BatchPlan {
        let input_bytes = units.iter().map(Unit::size_bytes).sum();
        let size = self.batch_size_for(units.len(), input_bytes);
        BatchPlan::new(units.len(), size, self.config.min_batch_size)
    }
}
