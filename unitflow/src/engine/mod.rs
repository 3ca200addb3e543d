//! Job engine.
//!
//! [`UnitEngine`] is the caller-facing API. It validates a submission,
//! registers the job, creates its worker pool and hands the units to a
//! background driver task that runs the batch loop:
//!
//! 1. the memory governor samples usage and may shrink the plan
//! 2. the next batch of units is dispatched to the pool
//! 3. results are collected in completion order
//!
//! The caller holds a [`JobHandle`] for status, partial results and the
//! final [`JobResult`], which is always ordered by unit index.

mod config;
mod driver;
mod handle;
mod unit_engine;

pub use config::EngineConfig;
pub use handle::{JobHandle, JobResult, JobSnapshot};
pub use unit_engine::UnitEngine;
