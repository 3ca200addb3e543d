//! Batch planning and memory-aware throttling.
//!
//! A job's units are dispatched in contiguous batches. The [`BatchPlanner`]
//! picks the initial batch size from the job's input size and unit count;
//! the [`MemoryGovernor`] samples resource usage before every batch and halves
//! the remaining batch size under pressure, never below the configured floor.

mod governor;
mod planner;
mod sampler;

pub use governor::{
    MemoryConfig, MemoryGovernor, ResourcePressure, DEFAULT_MEMORY_THRESHOLD_BYTES,
    DEFAULT_PRESSURE_PAUSE,
};
pub use planner::{
    BatchConfig, BatchPlan, BatchPlanner, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MIN_BATCH_SIZE,
};
pub use sampler::{NullSampler, ResourceSampler, ResourceUsage, SystemSampler};
