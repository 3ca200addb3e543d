//! Caller-facing job handle.
//!
//! The driver task owns the job's progress; the handle observes it. Status
//! changes are published on a `watch` channel, and recorded units live in a
//! shared [`ResultAssembler`] so callers can read partial results at any time.

use crate::assembler::{AssembledResult, ResultAssembler};
use crate::batch::ResourcePressure;
use crate::error::EngineError;
use crate::job::{JobId, JobStatus, ProcessedUnit, UnitStatus};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Final result of a job.
///
/// A cancelled job still produces a result: units that never ran carry
/// their original content and a `Cancelled` outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job_id: JobId,
    /// `Completed` or `Cancelled`
    pub status: JobStatus,
    /// Units ascending by index, one per submitted unit
    pub result: AssembledResult,
    /// Every time the governor shrank the batch size
    pub pressure: Vec<ResourcePressure>,
}

impl JobResult {
    pub fn units(&self) -> &[ProcessedUnit] {
        &self.result.units
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == JobStatus::Cancelled
    }

    /// True if any unit fell back to its original content.
    pub fn degraded(&self) -> bool {
        self.result.degraded
    }

    /// Joins the unit contents in index order.
    pub fn merged(&self, separator: &str) -> String {
        self.result.merged(separator)
    }
}

/// Point-in-time view of a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Number of units submitted
    pub total: usize,
    /// Units recorded so far, ascending by index
    pub partial: AssembledResult,
    /// Per-unit status, ascending by index
    pub units: Vec<(u64, UnitStatus)>,
}

impl JobSnapshot {
    pub fn completed(&self) -> usize {
        self.partial.len()
    }

    pub fn in_flight(&self) -> usize {
        self.units
            .iter()
            .filter(|(_, status)| *status == UnitStatus::InFlight)
            .count()
    }
}

#[derive(Debug)]
struct JobState {
    assembler: ResultAssembler,
    unit_status: BTreeMap<u64, UnitStatus>,
    pressure: Vec<ResourcePressure>,
    result: Option<JobResult>,
}

/// State shared between a job's driver and its handles.
#[derive(Debug)]
pub(crate) struct JobShared {
    job_id: JobId,
    total: usize,
    state: Mutex<JobState>,
    status: watch::Sender<JobStatus>,
}

impl JobShared {
    pub(crate) fn new(job_id: JobId, indices: impl IntoIterator<Item = u64>) -> Self {
        let unit_status: BTreeMap<u64, UnitStatus> = indices
            .into_iter()
            .map(|index| (index, UnitStatus::Pending))
            .collect();
        let total = unit_status.len();
        let (status, _) = watch::channel(JobStatus::Created);
        Self {
            job_id,
            total,
            state: Mutex::new(JobState {
                assembler: ResultAssembler::with_capacity(total),
                unit_status,
                pressure: Vec::new(),
                result: None,
            }),
            status,
        }
    }

    pub(crate) fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        self.status.send_replace(status);
    }

    pub(crate) fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    pub(crate) fn mark_in_flight(&self, index: u64) {
        if let Some(status) = self.state.lock().unit_status.get_mut(&index) {
            *status = UnitStatus::InFlight;
        }
    }

    pub(crate) fn record(&self, unit: ProcessedUnit) {
        let mut state = self.state.lock();
        state.unit_status.insert(unit.index, unit.outcome.status());
        state.assembler.record(unit);
    }

    pub(crate) fn cancelled_count(&self) -> usize {
        self.state.lock().assembler.cancelled_count()
    }

    pub(crate) fn record_pressure(&self, pressure: ResourcePressure) {
        self.state.lock().pressure.push(pressure);
    }

    /// Stores the final result and publishes the terminal status.
    pub(crate) fn finish(&self, status: JobStatus) -> JobResult {
        let result = {
            let mut state = self.state.lock();
            let result = JobResult {
                job_id: self.job_id.clone(),
                status,
                result: state.assembler.snapshot(),
                pressure: state.pressure.clone(),
            };
            state.result = Some(result.clone());
            result
        };
        self.set_status(status);
        result
    }

    fn snapshot(&self) -> JobSnapshot {
        let state = self.state.lock();
        JobSnapshot {
            job_id: self.job_id.clone(),
            status: self.status(),
            total: self.total,
            partial: state.assembler.snapshot(),
            units: state
                .unit_status
                .iter()
                .map(|(index, status)| (*index, *status))
                .collect(),
        }
    }

    fn stored_result(&self) -> Option<JobResult> {
        self.state.lock().result.clone()
    }

    /// Result for a driver that ended without finishing (panicked or aborted).
    fn abandoned_result(&self) -> JobResult {
        let state = self.state.lock();
        JobResult {
            job_id: self.job_id.clone(),
            status: JobStatus::Cancelled,
            result: state.assembler.snapshot(),
            pressure: state.pressure.clone(),
        }
    }
}

/// Handle to a submitted job.
///
/// Cloneable; all clones observe the same job.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
    status_rx: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub(crate) fn new(shared: Arc<JobShared>) -> Self {
        let status_rx = shared.status.subscribe();
        Self { shared, status_rx }
    }

    pub fn id(&self) -> &JobId {
        &self.shared.job_id
    }

    /// Returns the current job status without waiting.
    pub fn status(&self) -> JobStatus {
        *self.status_rx.borrow()
    }

    /// Number of units submitted.
    pub fn total(&self) -> usize {
        self.shared.total
    }

    /// Returns partial results and per-unit status.
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.snapshot()
    }

    /// Waits for the job to reach a terminal state and returns its result.
    ///
    /// Cancelled jobs return normally; check [`JobResult::is_cancelled`].
    pub async fn wait(&self) -> JobResult {
        let mut rx = self.status_rx.clone();
        // Err means the sender is gone; fall through to whatever was stored
        let _ = rx.wait_for(|status| status.is_terminal()).await;
        self.shared
            .stored_result()
            .unwrap_or_else(|| self.shared.abandoned_result())
    }

    /// Waits for the job and returns its result, or
    /// [`EngineError::Cancelled`] if it was cancelled.
    pub async fn result(&self) -> Result<JobResult, EngineError> {
        let result = self.wait().await;
        if result.is_cancelled() {
            return Err(EngineError::Cancelled(result.job_id));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.shared.job_id)
            .field("status", &self.status())
            .finish()
    }
}
