//! Handle to a single unit of work submitted to a worker pool.

use crate::error::PoolError;
use crate::job::JobId;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle returned by [`WorkerPoolManager::submit`](super::WorkerPoolManager::submit).
///
/// Dropping the handle does not cancel the work; it only discards the result.
pub struct WorkHandle<T> {
    job_id: JobId,
    join: JoinHandle<Result<T, PoolError>>,
}

impl<T> WorkHandle<T> {
    pub(crate) fn new(job_id: JobId, join: JoinHandle<Result<T, PoolError>>) -> Self {
        Self { job_id, join }
    }

    /// Returns the id of the job the work belongs to.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Returns true once the work has resolved (completed, cancelled or failed).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the result with no timeout.
    pub async fn join(self) -> Result<T, PoolError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PoolError::Cancelled),
            Err(e) => Err(PoolError::WorkerFailed(e.to_string())),
        }
    }

    /// Waits for the result for at most `timeout`.
    ///
    /// On timeout the work is aborted, releasing its worker slot. Its result
    /// is never delivered.
    pub async fn result(self, timeout: Duration) -> Result<T, PoolError> {
        let abort = self.join.abort_handle();
        match tokio::time::timeout(timeout, self.join()).await {
            Ok(result) => result,
            Err(_) => {
                abort.abort();
                Err(PoolError::Timeout(timeout))
            }
        }
    }
}

impl<T> std::fmt::Debug for WorkHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkHandle")
            .field("job_id", &self.job_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
