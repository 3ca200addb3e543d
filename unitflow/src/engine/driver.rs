//! Job driver: runs one job's batching loop to completion.
//!
//! ```text
//! Created → Registered → { Dispatching → Awaiting → Collecting }* → Finalizing → Completed
//!                      ↘ (cancellation at any batch boundary) ─────→ Finalizing → Cancelled
//! ```
//!
//! Each loop iteration lets the governor adjust the plan, dispatches one
//! batch to the job's pool and collects its results in completion order.
//! Cancellation is checked between batches; units that were never dispatched
//! are recorded as cancelled with their original content so the final result
//! always holds one entry per submitted unit. A cancel seen only after every
//! unit has finished leaves the job `Completed`.

use super::handle::JobShared;
use crate::batch::{BatchPlan, MemoryGovernor};
use crate::error::PoolError;
use crate::job::{JobStatus, ProcessedUnit, Unit};
use crate::pool::{PoolTicket, WorkerPoolManager};
use crate::processor::{Provider, RetryingUnitProcessor};
use crate::registry::{JobRegistry, Registration};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Everything a driver needs, moved into its task.
pub(crate) struct JobDriver<P: Provider> {
    pub(crate) shared: Arc<JobShared>,
    pub(crate) registration: Registration,
    pub(crate) ticket: PoolTicket,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) pools: Arc<WorkerPoolManager>,
    pub(crate) processor: RetryingUnitProcessor<P>,
    pub(crate) governor: MemoryGovernor,
    pub(crate) plan: BatchPlan,
    pub(crate) unit_timeout: Duration,
}

/// Publishes a terminal status if the driver ends without one.
struct FinishGuard(Arc<JobShared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.0.status().is_terminal() {
            warn!(job_id = %self.0.job_id(), "Job driver ended early");
            self.0.finish(JobStatus::Cancelled);
        }
    }
}

impl<P: Provider> JobDriver<P> {
    /// Runs the job. `units` must be sorted by index; the plan's ranges
    /// index into it.
    pub(crate) async fn run(mut self, units: Vec<Unit>) {
        let job_id = self.shared.job_id().clone();
        let _guard = FinishGuard(Arc::clone(&self.shared));
        let mut batch = 0usize;
        let mut cancelled = false;

        info!(
            job_id = %job_id,
            units = units.len(),
            batch_size = self.plan.batch_size(),
            "Job started"
        );

        loop {
            if self.registration.is_cancelled() {
                cancelled = true;
                break;
            }

            if let Some(pressure) = self.governor.regulate(&job_id, &mut self.plan).await {
                self.shared.record_pressure(pressure);
            }

            // The pressure pause is a wait; check again before dispatching
            if self.registration.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(range) = self.plan.next_batch() else {
                break;
            };
            batch += 1;

            self.shared.set_status(JobStatus::Dispatching { batch });
            let mut pending = FuturesUnordered::new();
            for unit in &units[range.clone()] {
                match self.dispatch(unit.clone()) {
                    Some(wait) => pending.push(wait),
                    None if self.registration.is_cancelled() => {
                        self.shared.record(ProcessedUnit::cancelled(unit.clone()))
                    }
                    None => {
                        warn!(job_id = %job_id, index = unit.index, "Worker pool refused unit");
                        self.shared.record(ProcessedUnit::degraded(
                            unit.clone(),
                            0,
                            "worker pool unavailable",
                        ))
                    }
                }
            }
            debug!(job_id = %job_id, batch, units = range.len(), "Batch dispatched");

            self.shared.set_status(JobStatus::Awaiting { batch });
            let mut collecting = false;
            while let Some(processed) = pending.next().await {
                if !collecting {
                    self.shared.set_status(JobStatus::Collecting { batch });
                    collecting = true;
                }
                self.shared.record(processed);
            }
            debug!(job_id = %job_id, batch, "Batch collected");
        }

        // A cancel that lands after the last batch ran to completion has
        // nothing left to drop
        if cancelled && self.plan.is_exhausted() && self.shared.cancelled_count() == 0 {
            debug!(job_id = %job_id, "Cancel arrived after every unit finished");
            cancelled = false;
        }

        if cancelled {
            for range in self.plan.remaining_ranges() {
                for unit in &units[range] {
                    self.shared.record(ProcessedUnit::cancelled(unit.clone()));
                }
            }
        }

        self.shared.set_status(JobStatus::Finalizing);
        let status = if cancelled {
            JobStatus::Cancelled
        } else {
            JobStatus::Completed
        };
        let result = self.shared.finish(status);

        self.pools.retire(&self.ticket);
        self.registry.release(&self.registration);

        info!(
            job_id = %job_id,
            status = %status,
            batches = batch,
            succeeded = result.result.success_count(),
            degraded = result.result.degraded_count(),
            cancelled = result.result.cancelled_count(),
            "Job finished"
        );
    }

    /// Submits one unit and returns a future resolving to its processed form.
    ///
    /// Returns `None` if the pool refused the submission.
    fn dispatch(&self, unit: Unit) -> Option<impl std::future::Future<Output = ProcessedUnit>> {
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let processor = self.processor.clone();
        let token = self.registration.token().clone();
        let task_unit = unit.clone();

        let handle = self.pools.submit_to(&self.ticket, async move {
            let _ = started_tx.send(());
            shared.mark_in_flight(task_unit.index);
            let job_id = shared.job_id().clone();
            processor.process(&job_id, task_unit, &token).await
        })?;

        let timeout = self.unit_timeout;
        let job_id = handle.job_id().clone();
        Some(async move {
            // The timeout runs from when the unit starts, not while it queues
            // for a worker. A dropped sender means it never will start.
            let _ = started_rx.await;
            match handle.result(timeout).await {
                Ok(processed) => processed,
                Err(PoolError::Cancelled) => ProcessedUnit::cancelled(unit),
                Err(e @ PoolError::Timeout(_)) => {
                    warn!(job_id = %job_id, index = unit.index, error = %e, "Unit timed out, work aborted");
                    ProcessedUnit::degraded(unit, 0, e.to_string())
                }
                Err(e @ PoolError::WorkerFailed(_)) => {
                    warn!(job_id = %job_id, index = unit.index, error = %e, "Unit worker failed");
                    ProcessedUnit::degraded(unit, 0, e.to_string())
                }
            }
        })
    }
}
