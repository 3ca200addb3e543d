//! Integration tests for the unit engine.
//!
//! These tests drive the public API end to end:
//! - Result length and ordering under failures and shuffled completion
//! - Retries, degradation and unit timeouts
//! - Cancellation before start and mid-batch
//! - Replacement of a running job id
//! - Whole-text-first processing with a chunked fallback
//! - Batch shrinking under simulated memory pressure

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use unitflow::batch::{
    BatchConfig, MemoryConfig, NullSampler, ResourceSampler, ResourceUsage,
};
use unitflow::engine::{EngineConfig, UnitEngine};
use unitflow::error::EngineError;
use unitflow::job::{JobId, JobStatus, Unit, UnitOutcome, UnitStatus};
use unitflow::pool::WorkerPoolManager;
use unitflow::processor::{Provider, ProviderError};
use unitflow::registry::JobRegistry;

// =============================================================================
// Test Helpers
// =============================================================================

/// Uppercases text. Content listed in `failures` fails that many times first.
#[derive(Default)]
struct FlakyProvider {
    calls: AtomicUsize,
    failures: Mutex<HashMap<String, u32>>,
    always_fail: bool,
}

impl FlakyProvider {
    fn failing_first(failures: &[(&str, u32)]) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(
                failures
                    .iter()
                    .map(|(content, n)| (content.to_string(), *n))
                    .collect(),
            ),
            ..Self::default()
        })
    }

    fn always_failing() -> Arc<Self> {
        Arc::new(Self {
            always_fail: true,
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for FlakyProvider {
    async fn process(&self, text: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.always_fail {
            return Err(ProviderError::transient("service unavailable"));
        }
        if let Some(remaining) = self.failures.lock().get_mut(text) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ProviderError::transient("rate limited"));
            }
        }
        Ok(text.to_uppercase())
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Blocks every call until the test releases permits.
struct GatedProvider {
    calls: AtomicUsize,
    gate: Semaphore,
}

impl GatedProvider {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn release_all(&self) {
        self.gate.add_permits(1000);
    }
}

impl Provider for GatedProvider {
    async fn process(&self, text: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ProviderError::permanent("gate closed"))?;
        Ok(text.to_uppercase())
    }

    fn name(&self) -> &str {
        "gated"
    }
}

/// Sleeps for a per-content delay, then uppercases.
struct SlowProvider {
    delays: HashMap<String, Duration>,
}

impl Provider for SlowProvider {
    async fn process(&self, text: &str) -> Result<String, ProviderError> {
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        Ok(text.to_uppercase())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Takes 4s per call, then fails transiently.
#[derive(Default)]
struct StallingProvider {
    calls: AtomicUsize,
}

impl Provider for StallingProvider {
    async fn process(&self, _text: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(4)).await;
        Err(ProviderError::transient("upstream timeout"))
    }

    fn name(&self) -> &str {
        "stalling"
    }
}

/// Cancels its own job from inside the call, then succeeds.
struct SelfCancellingProvider {
    registry: Arc<JobRegistry>,
    job_id: JobId,
}

impl Provider for SelfCancellingProvider {
    async fn process(&self, text: &str) -> Result<String, ProviderError> {
        self.registry.cancel(&self.job_id);
        Ok(text.to_uppercase())
    }

    fn name(&self) -> &str {
        "self-cancelling"
    }
}

/// Replays scripted memory readings, then reports zero.
#[derive(Default)]
struct ScriptedSampler {
    readings: Mutex<VecDeque<u64>>,
    reclaims: AtomicUsize,
}

impl ResourceSampler for ScriptedSampler {
    fn sample(&self) -> ResourceUsage {
        ResourceUsage::from_bytes(self.readings.lock().pop_front().unwrap_or(0))
    }

    fn reclaim(&self) {
        self.reclaims.fetch_add(1, Ordering::SeqCst);
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        memory: MemoryConfig {
            enabled: false,
            ..MemoryConfig::default()
        },
        ..EngineConfig::default()
    }
}

fn engine_with<P: Provider>(
    provider: Arc<P>,
    config: EngineConfig,
    sampler: Arc<dyn ResourceSampler>,
) -> UnitEngine<P> {
    let registry = Arc::new(JobRegistry::new());
    let pools = Arc::new(WorkerPoolManager::new(Arc::clone(&registry)));
    UnitEngine::with_parts(config, provider, registry, pools, sampler)
}

fn engine<P: Provider>(provider: Arc<P>) -> UnitEngine<P> {
    engine_with(provider, test_config(), Arc::new(NullSampler))
}

fn units(contents: &[&str]) -> Vec<Unit> {
    contents
        .iter()
        .enumerate()
        .map(|(i, content)| Unit::new(i as u64, *content))
        .collect()
}

/// Yields until `condition` holds.
async fn until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

// =============================================================================
// Results
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_every_call_failing_still_returns_every_unit() {
    let provider = FlakyProvider::always_failing();
    let engine = engine(Arc::clone(&provider));

    let handle = engine
        .submit_job(JobId::new("doc"), units(&["a", "b", "c", "d"]), 3)
        .unwrap();
    let result = handle.result().await.unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.units().len(), 4);
    assert!(result.degraded());
    assert_eq!(result.merged(""), "abcd");
    for unit in result.units() {
        assert_eq!(
            unit.outcome,
            UnitOutcome::Degraded {
                attempts: 3,
                reason: "service unavailable".into()
            }
        );
    }
    assert_eq!(provider.calls(), 12);
}

#[tokio::test(start_paused = true)]
async fn test_units_two_and_three_succeed_after_retry() {
    let provider = FlakyProvider::failing_first(&[("u2", 2), ("u3", 2)]);
    let engine = engine(Arc::clone(&provider));

    let handle = engine
        .submit_job(JobId::new("doc"), units(&["u0", "u1", "u2", "u3", "u4"]), 3)
        .unwrap();
    let result = handle.result().await.unwrap();

    let outcomes: Vec<UnitOutcome> = result.units().iter().map(|u| u.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            UnitOutcome::Succeeded,
            UnitOutcome::Succeeded,
            UnitOutcome::SucceededAfterRetry { attempts: 3 },
            UnitOutcome::SucceededAfterRetry { attempts: 3 },
            UnitOutcome::Succeeded,
        ]
    );
    assert!(!result.degraded());
    assert_eq!(result.merged(" "), "U0 U1 U2 U3 U4");
    assert_eq!(provider.calls(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_results_ordered_regardless_of_completion_order() {
    let contents = ["p0", "p1", "p2", "p3", "p4", "p5", "p6", "p7"];
    // Earlier units finish last
    let delays = contents
        .iter()
        .enumerate()
        .map(|(i, c)| (c.to_string(), Duration::from_millis(100 * (8 - i as u64))))
        .collect();
    let engine = engine(Arc::new(SlowProvider { delays }));

    let mut shuffled = units(&contents);
    shuffled.reverse();
    let handle = engine.submit_job(JobId::new("doc"), shuffled, 4).unwrap();
    let result = handle.result().await.unwrap();

    let indices: Vec<u64> = result.units().iter().map(|u| u.index).collect();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
    assert_eq!(result.merged(","), "P0,P1,P2,P3,P4,P5,P6,P7");
}

#[tokio::test(start_paused = true)]
async fn test_unit_timeout_degrades_to_original() {
    let delays = [("stuck".to_string(), Duration::from_secs(120))]
        .into_iter()
        .collect();
    let config = EngineConfig {
        unit_timeout: Duration::from_secs(5),
        ..test_config()
    };
    let engine = engine_with(Arc::new(SlowProvider { delays }), config, Arc::new(NullSampler));

    let handle = engine
        .submit_job(JobId::new("doc"), units(&["fine", "stuck"]), 2)
        .unwrap();
    let result = handle.result().await.unwrap();

    assert_eq!(result.units()[0].outcome, UnitOutcome::Succeeded);
    assert_eq!(result.units()[1].content, "stuck");
    assert!(result.units()[1].outcome.is_degraded());
}

#[tokio::test]
async fn test_process_text_tries_large_text_whole_first() {
    let provider = FlakyProvider::failing_first(&[]);
    let config = EngineConfig {
        chunk_size: 12,
        ..test_config()
    };
    let engine = engine_with(Arc::clone(&provider), config, Arc::new(NullSampler));

    let short = engine.process_text("hi there").await.unwrap();
    assert_eq!(short.units().len(), 1);
    assert_eq!(short.merged("\n\n"), "HI THERE");

    let long = engine
        .process_text("first part\n\nsecond part\n\nthird")
        .await
        .unwrap();
    assert_eq!(long.units().len(), 1);
    assert_eq!(long.merged("\n\n"), "FIRST PART\n\nSECOND PART\n\nTHIRD");
    assert_eq!(provider.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_process_text_falls_back_to_chunks_when_whole_fails() {
    let text = "first part\n\nsecond part\n\nthird";
    let provider = FlakyProvider::failing_first(&[(text, 1)]);
    let config = EngineConfig {
        chunk_size: 12,
        ..test_config()
    };
    let engine = engine_with(Arc::clone(&provider), config, Arc::new(NullSampler));

    let result = engine
        .process_text_as(JobId::new("note"), text)
        .await
        .unwrap();

    assert_eq!(result.units().len(), 3);
    assert!(!result.degraded());
    assert_eq!(result.merged("\n\n"), "FIRST PART\n\nSECOND PART\n\nTHIRD");
    // One whole-text attempt, then one call per chunk
    assert_eq!(provider.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_unit_stops_calling_provider() {
    let provider = Arc::new(StallingProvider::default());
    let config = EngineConfig {
        unit_timeout: Duration::from_secs(6),
        ..test_config()
    };
    let engine = engine_with(Arc::clone(&provider), config, Arc::new(NullSampler));

    let handle = engine
        .submit_job(JobId::new("doc"), units(&["slow"]), 1)
        .unwrap();
    let result = handle.wait().await;
    assert_eq!(result.units()[0].outcome.attempts(), 0);
    assert!(result.units()[0].outcome.is_degraded());
    let calls_at_finish = provider.calls.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls_at_finish);
}

// =============================================================================
// Validation and lookups
// =============================================================================

#[tokio::test]
async fn test_invalid_submissions_rejected() {
    let engine = engine(FlakyProvider::failing_first(&[]));
    let id = JobId::new("doc");

    assert_eq!(
        engine.submit_job(id.clone(), vec![], 3).unwrap_err(),
        EngineError::EmptyJob(id.clone())
    );
    assert_eq!(
        engine.submit_job(id.clone(), units(&["a"]), 0).unwrap_err(),
        EngineError::InvalidWorkerCount(0)
    );
    assert_eq!(
        engine
            .submit_job(id.clone(), vec![Unit::new(1, "a"), Unit::new(1, "b")], 2)
            .unwrap_err(),
        EngineError::DuplicateUnitIndex { job_id: id, index: 1 }
    );
    assert!(engine.active_jobs().is_empty());
}

#[tokio::test]
async fn test_cancel_unknown_id_changes_nothing() {
    let engine = engine(FlakyProvider::failing_first(&[]));
    let unknown = JobId::new("unknown-id");

    assert!(!engine.cancel_job(&unknown));
    assert!(engine.active_jobs().is_empty());
    assert!(engine.registry().list_cancelled().is_empty());
    assert_eq!(
        engine.handle(&unknown).unwrap_err(),
        EngineError::JobNotFound(unknown)
    );
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_before_start_makes_no_provider_calls() {
    let provider = FlakyProvider::failing_first(&[]);
    let engine = engine(Arc::clone(&provider));
    let id = JobId::new("doc");

    let handle = engine.submit_job(id.clone(), units(&["a", "b", "c"]), 2).unwrap();
    assert!(engine.cancel_job(&id));

    let result = handle.wait().await;
    assert!(result.is_cancelled());
    assert_eq!(result.units().len(), 3);
    assert!(result.units().iter().all(|u| u.outcome == UnitOutcome::Cancelled));
    assert_eq!(result.merged(""), "abc");
    assert_eq!(provider.calls(), 0);
    assert_eq!(handle.result().await.unwrap_err(), EngineError::Cancelled(id));
}

#[tokio::test]
async fn test_cancel_mid_batch_finishes_in_flight_and_stops() {
    let provider = GatedProvider::new();
    let config = EngineConfig {
        batch: BatchConfig {
            max_batch_size: 2,
            min_batch_size: 1,
        },
        ..test_config()
    };
    let engine = engine_with(Arc::clone(&provider), config, Arc::new(NullSampler));
    let id = JobId::new("doc");

    let handle = engine
        .submit_job(id.clone(), units(&["a", "b", "c", "d", "e", "f"]), 2)
        .unwrap();
    until(|| provider.calls() == 2).await;

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, JobStatus::Awaiting { batch: 1 });
    assert_eq!(snapshot.in_flight(), 2);
    assert_eq!(snapshot.completed(), 0);

    assert!(engine.cancel_job(&id));
    provider.release_all();

    let result = handle.wait().await;
    assert!(result.is_cancelled());
    assert_eq!(result.units().len(), 6);
    assert_eq!(result.merged(""), "ABcdef");
    assert_eq!(result.units()[0].outcome, UnitOutcome::Succeeded);
    assert!(result.units()[2..]
        .iter()
        .all(|u| u.outcome == UnitOutcome::Cancelled));
    // No further batch was dispatched
    assert_eq!(provider.calls(), 2);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.units[5], (5, UnitStatus::Cancelled));
}

#[tokio::test]
async fn test_resubmitting_active_id_replaces_prior_job() {
    let provider = GatedProvider::new();
    let engine = engine(Arc::clone(&provider));
    let id = JobId::new("doc");

    // One worker: "a" runs, "b" queues behind it
    let first = engine.submit_job(id.clone(), units(&["a", "b"]), 1).unwrap();
    until(|| provider.calls() == 1).await;

    let second = engine.submit_job(id.clone(), units(&["c"]), 1).unwrap();
    assert_eq!(engine.handle(&id).unwrap().total(), 1);
    provider.release_all();

    let old = first.wait().await;
    assert!(old.is_cancelled());
    assert_eq!(old.units()[0].outcome, UnitOutcome::Succeeded);
    assert_eq!(old.units()[1].outcome, UnitOutcome::Cancelled);

    let new = second.result().await.unwrap();
    assert_eq!(new.merged(""), "C");
    assert_eq!(provider.calls(), 2);

    until(|| engine.active_jobs().is_empty()).await;
    until(|| engine.handle(&id).is_err()).await;
}

#[tokio::test]
async fn test_shutdown_cancels_every_job() {
    let provider = GatedProvider::new();
    let engine = engine(Arc::clone(&provider));

    let first = engine
        .submit_job(JobId::new("one"), units(&["a", "b", "c"]), 1)
        .unwrap();
    let second = engine
        .submit_job(JobId::new("two"), units(&["d", "e", "f"]), 1)
        .unwrap();
    until(|| provider.calls() == 2).await;

    assert_eq!(engine.shutdown(), 2);
    provider.release_all();

    for handle in [first, second] {
        let result = handle.wait().await;
        assert!(result.is_cancelled());
        assert_eq!(result.units().len(), 3);
        assert_eq!(result.result.cancelled_count(), 2);
    }
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn test_cancel_after_last_unit_finished_still_completes() {
    let registry = Arc::new(JobRegistry::new());
    let pools = Arc::new(WorkerPoolManager::new(Arc::clone(&registry)));
    let id = JobId::new("doc");
    let provider = Arc::new(SelfCancellingProvider {
        registry: Arc::clone(&registry),
        job_id: id.clone(),
    });
    let engine = UnitEngine::with_parts(
        test_config(),
        provider,
        registry,
        pools,
        Arc::new(NullSampler),
    );

    let handle = engine.submit_job(id, units(&["only"]), 1).unwrap();
    let result = handle.result().await.unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.merged(""), "ONLY");
}

#[tokio::test]
async fn test_waiting_on_pool_does_not_disturb_running_job() {
    let provider = GatedProvider::new();
    let config = EngineConfig {
        batch: BatchConfig {
            max_batch_size: 1,
            min_batch_size: 1,
        },
        ..test_config()
    };
    let engine = engine_with(Arc::clone(&provider), config, Arc::new(NullSampler));
    let id = JobId::new("doc");

    let handle = engine
        .submit_job(id.clone(), units(&["a", "b", "c"]), 1)
        .unwrap();
    until(|| provider.calls() == 1).await;

    let waiter = tokio::spawn({
        let pools = Arc::clone(engine.pools());
        let id = id.clone();
        async move { pools.wait_for_completion(&id, None).await }
    });
    tokio::task::yield_now().await;
    provider.release_all();

    let result = handle.result().await.unwrap();
    assert_eq!(result.status, JobStatus::Completed);
    assert!(result.result.is_complete_success());
    assert_eq!(result.merged(""), "ABC");
    assert!(waiter.await.unwrap());
    assert_eq!(provider.calls(), 3);
}

// =============================================================================
// Memory pressure
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_pressure_halves_batches_down_to_floor() {
    let sampler = Arc::new(ScriptedSampler::default());
    // Batch 1 unpressured, then three pressured samples
    sampler
        .readings
        .lock()
        .extend([0, 2_000, 2_000, 2_000]);

    let config = EngineConfig {
        batch: BatchConfig {
            max_batch_size: 8,
            min_batch_size: 2,
        },
        memory: MemoryConfig {
            enabled: true,
            threshold_bytes: 1_000,
            pause: Duration::from_millis(100),
        },
        ..test_config()
    };
    let contents: Vec<String> = (0..30).map(|i| format!("u{}", i)).collect();
    let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
    let engine = engine_with(
        FlakyProvider::failing_first(&[]),
        config,
        Arc::clone(&sampler) as Arc<dyn ResourceSampler>,
    );

    let handle = engine.submit_job(JobId::new("big"), units(&refs), 4).unwrap();
    let result = handle.result().await.unwrap();

    let sizes: Vec<(usize, usize)> = result
        .pressure
        .iter()
        .map(|p| (p.previous_batch_size, p.batch_size))
        .collect();
    assert_eq!(sizes, vec![(8, 4), (4, 2), (2, 2)]);
    assert_eq!(sampler.reclaims.load(Ordering::SeqCst), 3);

    assert_eq!(result.units().len(), 30);
    assert!(result.result.is_complete_success());
    let indices: Vec<u64> = result.units().iter().map(|u| u.index).collect();
    assert_eq!(indices, (0..30).collect::<Vec<_>>());
}
