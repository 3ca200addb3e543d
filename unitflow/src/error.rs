//! Error types for the engine and worker pools.

use crate::job::JobId;
use thiserror::Error;

/// Errors returned by the caller-facing engine API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Operation against an id with no active registration.
    #[error("Job '{0}' not found")]
    JobNotFound(JobId),

    /// The awaited job was cancelled before it completed.
    #[error("Job '{0}' was cancelled")]
    Cancelled(JobId),

    /// Two units in one submission share an index.
    #[error("Job '{job_id}' has duplicate unit index {index}")]
    DuplicateUnitIndex { job_id: JobId, index: u64 },

    /// A job must contain at least one unit.
    #[error("Job '{0}' has no units")]
    EmptyJob(JobId),

    /// A pool needs at least one worker.
    #[error("Invalid worker count {0} - must be at least 1")]
    InvalidWorkerCount(usize),
}

/// Errors surfaced when retrieving the result of a single pool submission.
///
/// The pool never retries; these are reported to whoever awaits the handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The work was dropped before it started because its job was cancelled.
    #[error("Work cancelled before it started")]
    Cancelled,

    /// The result did not arrive within the retrieval timeout.
    #[error("Timed out after {0:?} waiting for result")]
    Timeout(std::time::Duration),

    /// The worker panicked or was aborted.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}
