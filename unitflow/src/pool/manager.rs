//! Per-job bounded worker pools.

use super::handle::WorkHandle;
use crate::error::PoolError;
use crate::job::JobId;
use crate::registry::JobRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Identifies one specific pool instance for a job.
///
/// A job id can be given a new pool at any time (replacement); the ticket's
/// generation lets a caller keep submitting to the pool it created and be
/// refused once that pool has been replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolTicket {
    job_id: JobId,
    generation: u64,
}

impl PoolTicket {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One job's pool: a semaphore bounding concurrency plus a tracker over every
/// spawned submission.
struct WorkerPool {
    generation: u64,
    max_workers: usize,
    semaphore: Arc<Semaphore>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// Drops queued work and refuses new permits without waiting for
    /// in-flight work.
    fn shut_down(&self) {
        self.token.cancel();
        self.semaphore.close();
        self.tracker.close();
    }
}

/// Owns at most one bounded worker pool per job.
pub struct WorkerPoolManager {
    registry: Arc<JobRegistry>,
    pools: Mutex<HashMap<JobId, WorkerPool>>,
    next_generation: AtomicU64,
}

impl WorkerPoolManager {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self {
            registry,
            pools: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Returns the registry this manager reports cancellations to.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Creates a fresh pool for the job, cancelling any existing one first.
    ///
    /// If the job is registered, the pool's token is a child of the
    /// registration token, so cancelling the registration also drops the
    /// pool's queued work.
    pub fn create_pool(&self, job_id: &JobId, max_workers: usize) -> PoolTicket {
        let max_workers = max_workers.max(1);
        let token = self
            .registry
            .token(job_id)
            .map(|t| t.child_token())
            .unwrap_or_default();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let pool = WorkerPool {
            generation,
            max_workers,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            token,
            tracker: TaskTracker::new(),
        };

        let previous = self.pools.lock().insert(job_id.clone(), pool);
        if let Some(previous) = previous {
            previous.shut_down();
            info!(
                job_id = %job_id,
                replaced_generation = previous.generation,
                outstanding = previous.tracker.len(),
                "Replaced existing worker pool"
            );
        }

        debug!(job_id = %job_id, max_workers, generation, "Created worker pool");
        PoolTicket {
            job_id: job_id.clone(),
            generation,
        }
    }

    /// Submits work to the job's current pool.
    ///
    /// Returns `None` if there is no pool or the job is already flagged
    /// cancelled. The check is advisory: a cancellation arriving right after
    /// it may still let the work start.
    pub fn submit<F, T>(&self, job_id: &JobId, task: F) -> Option<WorkHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let pools = self.pools.lock();
        let Some(pool) = pools.get(job_id) else {
            warn!(job_id = %job_id, "No worker pool for job");
            return None;
        };
        // Covers a registration made after the pool, whose token the pool lacks
        if self.registry.is_cancelled(job_id) {
            debug!(job_id = %job_id, "Job is cancelled, not submitting work");
            return None;
        }
        self.spawn_into(job_id, pool, task)
    }

    /// Submits work only if `ticket` still names the job's current pool.
    pub fn submit_to<F, T>(&self, ticket: &PoolTicket, task: F) -> Option<WorkHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let pools = self.pools.lock();
        let pool = pools
            .get(&ticket.job_id)
            .filter(|pool| pool.generation == ticket.generation)?;
        self.spawn_into(&ticket.job_id, pool, task)
    }

    fn spawn_into<F, T>(&self, job_id: &JobId, pool: &WorkerPool, task: F) -> Option<WorkHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if pool.token.is_cancelled() {
            debug!(job_id = %job_id, "Job is cancelled, not submitting work");
            return None;
        }

        let semaphore = Arc::clone(&pool.semaphore);
        let token = pool.token.clone();
        let join = pool.tracker.spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(PoolError::Cancelled),
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    // Closed semaphore means the pool was shut down
                    Err(_) => return Err(PoolError::Cancelled),
                },
            };
            if token.is_cancelled() {
                return Err(PoolError::Cancelled);
            }
            let output = task.await;
            drop(permit);
            Ok(output)
        });

        Some(WorkHandle::new(job_id.clone(), join))
    }

    /// Cancels a job: flags it in the registry, drops every submission that
    /// has not started, and shuts the pool down without waiting for
    /// in-flight work.
    ///
    /// Returns true if the job was registered or had a pool.
    pub fn cancel_job(&self, job_id: &JobId) -> bool {
        let flagged = self.registry.cancel(job_id);
        let pool = self.pools.lock().remove(job_id);

        if let Some(pool) = &pool {
            pool.shut_down();
            info!(
                job_id = %job_id,
                outstanding = pool.tracker.len(),
                "Worker pool cancelled"
            );
        }
        flagged || pool.is_some()
    }

    /// Waits until every submission to the job's pool has resolved, or the
    /// timeout elapses.
    ///
    /// Returns true if the pool drained (or there was no pool). Only waits:
    /// the pool stays registered and accepts new work afterwards. Removal is
    /// left to [`retire`](Self::retire) and [`cancel_job`](Self::cancel_job).
    pub async fn wait_for_completion(&self, job_id: &JobId, timeout: Option<Duration>) -> bool {
        let (tracker, generation) = {
            let pools = self.pools.lock();
            let Some(pool) = pools.get(job_id) else {
                return true;
            };
            // A tracker only resolves `wait` once closed
            pool.tracker.close();
            (pool.tracker.clone(), pool.generation)
        };

        debug!(job_id = %job_id, outstanding = tracker.len(), "Waiting for worker pool");
        let drained = match timeout {
            Some(limit) => tokio::time::timeout(limit, tracker.wait()).await.is_ok(),
            None => {
                tracker.wait().await;
                true
            }
        };

        {
            let pools = self.pools.lock();
            if pools
                .get(job_id)
                .is_some_and(|pool| pool.generation == generation)
            {
                tracker.reopen();
            }
        }

        if drained {
            debug!(job_id = %job_id, "Worker pool drained");
        } else {
            warn!(job_id = %job_id, outstanding = tracker.len(), "Timed out waiting for worker pool");
        }
        drained
    }

    /// Removes bookkeeping for a finished job's pool without cancelling it.
    ///
    /// Does nothing if `ticket` names a pool that has since been replaced.
    pub fn retire(&self, ticket: &PoolTicket) -> bool {
        let mut pools = self.pools.lock();
        let current = pools
            .get(&ticket.job_id)
            .is_some_and(|pool| pool.generation == ticket.generation);
        if current {
            if let Some(pool) = pools.remove(&ticket.job_id) {
                pool.semaphore.close();
                pool.tracker.close();
            }
        }
        current
    }

    /// Cancels every pool. Returns the number of pools shut down.
    pub fn cleanup_all(&self) -> usize {
        let drained: Vec<(JobId, WorkerPool)> = self.pools.lock().drain().collect();
        for (job_id, pool) in &drained {
            self.registry.cancel(job_id);
            pool.shut_down();
        }
        info!(count = drained.len(), "Cleaned up all worker pools");
        drained.len()
    }

    pub fn active_jobs(&self) -> Vec<JobId> {
        self.pools.lock().keys().cloned().collect()
    }

    /// Number of submissions to the job's pool that have not resolved.
    pub fn outstanding(&self, job_id: &JobId) -> usize {
        self.pools
            .lock()
            .get(job_id)
            .map(|pool| pool.tracker.len())
            .unwrap_or(0)
    }

    pub fn max_workers(&self, job_id: &JobId) -> Option<usize> {
        self.pools.lock().get(job_id).map(|pool| pool.max_workers)
    }
}

impl std::fmt::Debug for WorkerPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPoolManager")
            .field("pools", &self.pools.lock().len())
            .finish()
    }
}
