//! Worker pools scoped to a single job.
//!
//! Each job owns one bounded pool: a semaphore limits how many submissions run
//! at once, a [`CancellationToken`](tokio_util::sync::CancellationToken) drops
//! submissions that have not started, and a
//! [`TaskTracker`](tokio_util::task::TaskTracker) lets callers drain the pool.
//!
//! The pool never retries. A failed or panicked submission is reported as a
//! [`PoolError`](crate::error::PoolError) when its [`WorkHandle`] is awaited;
//! retrying is the job of [`RetryingUnitProcessor`](crate::processor::RetryingUnitProcessor).
//!
//! # Cancellation
//!
//! Cancellation is cooperative. Submissions still waiting for a worker slot
//! resolve to `PoolError::Cancelled` without running. Work that already
//! started is never interrupted by cancellation; only a result timeout in
//! [`WorkHandle::result`] aborts it.

mod handle;
mod manager;

pub use handle::WorkHandle;
pub use manager::{PoolTicket, WorkerPoolManager};
