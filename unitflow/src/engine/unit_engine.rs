//! The caller-facing engine.

use super::config::EngineConfig;
use super::driver::JobDriver;
use super::handle::{JobHandle, JobResult, JobShared};
use crate::batch::{BatchPlanner, MemoryGovernor, NullSampler, ResourceSampler, SystemSampler};
use crate::error::EngineError;
use crate::job::{JobId, JobStatus, Unit};
use crate::pool::WorkerPoolManager;
use crate::processor::{Provider, RetryingUnitProcessor};
use crate::registry::JobRegistry;
use crate::source;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

struct JobEntry {
    epoch: u64,
    handle: JobHandle,
}

/// Splits jobs into units and runs them through a provider.
///
/// The engine owns no global state: the registry and pool manager are
/// injected and may be shared with other engines.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use unitflow::engine::{EngineConfig, UnitEngine};
/// use unitflow::job::{JobId, Unit};
///
/// let engine = UnitEngine::new(EngineConfig::default(), Arc::new(my_provider));
/// let handle = engine.submit_job(
///     JobId::new("note-42"),
///     vec![Unit::new(0, "first"), Unit::new(1, "second")],
///     3,
/// )?;
/// let result = handle.result().await?;
/// println!("{}", result.merged("\n\n"));
/// ```
pub struct UnitEngine<P: Provider> {
    config: EngineConfig,
    processor: RetryingUnitProcessor<P>,
    registry: Arc<JobRegistry>,
    pools: Arc<WorkerPoolManager>,
    governor: MemoryGovernor,
    planner: BatchPlanner,
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
}

impl<P: Provider> UnitEngine<P> {
    /// Creates an engine with its own registry and pool manager.
    ///
    /// Memory is sampled from the current process when enabled in `config`.
    pub fn new(config: EngineConfig, provider: Arc<P>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let pools = Arc::new(WorkerPoolManager::new(Arc::clone(&registry)));
        let sampler: Arc<dyn ResourceSampler> = if config.memory.enabled {
            Arc::new(SystemSampler::new())
        } else {
            Arc::new(NullSampler)
        };
        Self::with_parts(config, provider, registry, pools, sampler)
    }

    /// Creates an engine from explicit parts.
    pub fn with_parts(
        config: EngineConfig,
        provider: Arc<P>,
        registry: Arc<JobRegistry>,
        pools: Arc<WorkerPoolManager>,
        sampler: Arc<dyn ResourceSampler>,
    ) -> Self {
        Self {
            processor: RetryingUnitProcessor::new(provider, config.retry),
            governor: MemoryGovernor::new(sampler, config.memory),
            planner: BatchPlanner::new(config.batch),
            config,
            registry,
            pools,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn pools(&self) -> &Arc<WorkerPoolManager> {
        &self.pools
    }

    /// Submits a job and starts processing it in the background.
    ///
    /// Submitting an id that is already running replaces the earlier job:
    /// its queued units are dropped and its result reports `Cancelled`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit_job(
        &self,
        job_id: JobId,
        units: Vec<Unit>,
        max_workers: usize,
    ) -> Result<JobHandle, EngineError> {
        self.submit_with(job_id, units, max_workers, self.processor.clone())
    }

    fn submit_with(
        &self,
        job_id: JobId,
        mut units: Vec<Unit>,
        max_workers: usize,
        processor: RetryingUnitProcessor<P>,
    ) -> Result<JobHandle, EngineError> {
        if max_workers == 0 {
            return Err(EngineError::InvalidWorkerCount(max_workers));
        }
        if units.is_empty() {
            return Err(EngineError::EmptyJob(job_id));
        }
        units.sort_by_key(|u| u.index);
        if let Some(pair) = units.windows(2).find(|pair| pair[0].index == pair[1].index) {
            return Err(EngineError::DuplicateUnitIndex {
                job_id,
                index: pair[0].index,
            });
        }

        let shared = Arc::new(JobShared::new(
            job_id.clone(),
            units.iter().map(|u| u.index),
        ));
        let handle = JobHandle::new(Arc::clone(&shared));

        let registration = self.registry.register(&job_id);
        shared.set_status(JobStatus::Registered);
        let ticket = self
            .pools
            .create_pool(&job_id, max_workers.min(units.len()));
        let plan = self.planner.plan(&units);

        let epoch = registration.epoch();
        self.jobs.lock().insert(
            job_id.clone(),
            JobEntry {
                epoch,
                handle: handle.clone(),
            },
        );

        info!(
            job_id = %job_id,
            units = units.len(),
            max_workers,
            epoch,
            "Job submitted"
        );

        let driver = JobDriver {
            shared,
            registration,
            ticket,
            registry: Arc::clone(&self.registry),
            pools: Arc::clone(&self.pools),
            processor,
            governor: self.governor.clone(),
            plan,
            unit_timeout: self.config.unit_timeout,
        };
        let jobs = Arc::clone(&self.jobs);
        tokio::spawn(async move {
            driver.run(units).await;
            let mut jobs = jobs.lock();
            if jobs.get(&job_id).is_some_and(|entry| entry.epoch == epoch) {
                jobs.remove(&job_id);
            }
        });

        Ok(handle)
    }

    /// Cancels a running job.
    ///
    /// Returns false, with no state change, if the id is not running.
    pub fn cancel_job(&self, job_id: &JobId) -> bool {
        self.pools.cancel_job(job_id)
    }

    /// Returns the handle of a running job.
    pub fn handle(&self, job_id: &JobId) -> Result<JobHandle, EngineError> {
        self.jobs
            .lock()
            .get(job_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| EngineError::JobNotFound(job_id.clone()))
    }

    /// Ids of jobs currently registered.
    pub fn active_jobs(&self) -> HashSet<JobId> {
        self.registry.list_active()
    }

    /// Processes one text, splitting it only when it has to.
    ///
    /// Text no longer than the configured chunk size goes to the provider as a
    /// single unit. Longer text is first tried whole, once. If that attempt
    /// does not succeed the text is split on paragraph boundaries, the chunks
    /// are processed with the full retry policy, and the results are joined
    /// with a blank line.
    pub async fn process_text(&self, text: &str) -> Result<JobResult, EngineError> {
        self.process_text_as(JobId::auto(), text).await
    }

    /// Like [`process_text`](Self::process_text) under a caller-chosen id.
    pub async fn process_text_as(
        &self,
        job_id: JobId,
        text: &str,
    ) -> Result<JobResult, EngineError> {
        let whole = vec![Unit::new(0, text)];
        if text.len() <= self.config.chunk_size {
            debug!(job_id = %job_id, bytes = text.len(), "Processing text whole");
            let handle = self.submit_job(job_id, whole, self.config.max_workers)?;
            return handle.result().await;
        }

        debug!(job_id = %job_id, bytes = text.len(), "Trying large text whole first");
        let single_attempt = RetryingUnitProcessor::new(
            Arc::clone(self.processor.provider()),
            self.processor.policy().with_max_attempts(1),
        );
        let direct = self
            .submit_with(job_id.clone(), whole, 1, single_attempt)?
            .result()
            .await?;
        if !direct.degraded() {
            return Ok(direct);
        }

        let units = source::units_from_text(text, self.config.chunk_size);
        if units.is_empty() {
            return Ok(direct);
        }
        info!(
            job_id = %job_id,
            bytes = text.len(),
            chunks = units.len(),
            "Whole-text attempt failed, processing in chunks"
        );
        let handle = self.submit_job(job_id, units, self.config.max_workers)?;
        handle.result().await
    }

    /// Cancels every running job. Returns the number of pools shut down.
    pub fn shutdown(&self) -> usize {
        let count = self.pools.cleanup_all();
        info!(count, "Engine shut down");
        count
    }
}

impl<P: Provider> std::fmt::Debug for UnitEngine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitEngine")
            .field("config", &self.config)
            .field("jobs", &self.jobs.lock().len())
            .finish()
    }
}
