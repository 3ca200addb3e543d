//! Retry, backoff and cancellation around a single provider call.

use super::policy::RetryPolicy;
use super::provider::Provider;
use crate::job::{JobId, ProcessedUnit, Unit, UnitOutcome};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Processes one unit with retries.
///
/// - The job's cancellation token is checked before every attempt; a
///   cancelled unit keeps its original content.
/// - Retryable failures are retried with linear backoff. Backoff waits end
///   early on cancellation so the next check fires promptly.
/// - When attempts run out, or a permanent error is returned, the unit is
///   degraded: its original content stands in for the result.
///
/// Content is never dropped. Every call resolves to a [`ProcessedUnit`].
pub struct RetryingUnitProcessor<P: Provider> {
    provider: Arc<P>,
    policy: RetryPolicy,
}

impl<P: Provider> Clone for RetryingUnitProcessor<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            policy: self.policy,
        }
    }
}

impl<P: Provider> RetryingUnitProcessor<P> {
    pub fn new(provider: Arc<P>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Processes `unit`, observing `token` at attempt boundaries.
    pub async fn process(
        &self,
        job_id: &JobId,
        unit: Unit,
        token: &CancellationToken,
    ) -> ProcessedUnit {
        let max_attempts = self.policy.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            if token.is_cancelled() {
                debug!(job_id = %job_id, index = unit.index, attempt, "Unit cancelled before attempt");
                return ProcessedUnit::cancelled(unit);
            }

            match self.provider.process(&unit.content).await {
                Ok(content) => {
                    let outcome = if attempt == 1 {
                        UnitOutcome::Succeeded
                    } else {
                        UnitOutcome::SucceededAfterRetry { attempts: attempt }
                    };
                    debug!(
                        job_id = %job_id,
                        index = unit.index,
                        provider = self.provider.name(),
                        attempt,
                        bytes = content.len(),
                        "Unit processed"
                    );
                    return ProcessedUnit {
                        index: unit.index,
                        content,
                        outcome,
                    };
                }
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        index = unit.index,
                        provider = self.provider.name(),
                        attempt,
                        max_attempts,
                        retryable = e.retryable,
                        error = %e,
                        "Unit processing failed"
                    );
                    last_error = e.message;
                    if !e.retryable {
                        return ProcessedUnit::degraded(unit, attempt, last_error);
                    }
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_after(attempt);
                debug!(job_id = %job_id, index = unit.index, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        warn!(
            job_id = %job_id,
            index = unit.index,
            attempts = max_attempts,
            "Unit degraded to original content"
        );
        ProcessedUnit::degraded(unit, max_attempts, last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ProviderError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Returns scripted results in order, then echoes the input uppercased.
    #[derive(Default)]
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<(), ProviderError>>>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn with_script(script: Vec<Result<(), ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }
    }

    impl Provider for ScriptedProvider {
        async fn process(&self, text: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            match next {
                Some(Err(e)) => Err(e),
                _ => Ok(text.to_uppercase()),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn processor(provider: Arc<ScriptedProvider>) -> RetryingUnitProcessor<ScriptedProvider> {
        RetryingUnitProcessor::new(provider, RetryPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success() {
        let provider = ScriptedProvider::with_script(vec![]);
        let result = processor(provider.clone())
            .process(&JobId::new("j"), Unit::new(0, "hello"), &CancellationToken::new())
            .await;

        assert_eq!(result.content, "HELLO");
        assert_eq!(result.outcome, UnitOutcome::Succeeded);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry_with_linear_backoff() {
        let provider = ScriptedProvider::with_script(vec![
            Err(ProviderError::transient("503")),
            Err(ProviderError::transient("503")),
        ]);
        let start = tokio::time::Instant::now();
        let result = processor(provider.clone())
            .process(&JobId::new("j"), Unit::new(2, "page"), &CancellationToken::new())
            .await;

        assert_eq!(result.content, "PAGE");
        assert_eq!(result.outcome, UnitOutcome::SucceededAfterRetry { attempts: 3 });
        // 1s after attempt 1, 2s after attempt 2
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_degrade_to_original() {
        let provider = ScriptedProvider::with_script(vec![
            Err(ProviderError::transient("a")),
            Err(ProviderError::transient("b")),
            Err(ProviderError::transient("c")),
        ]);
        let result = processor(provider.clone())
            .process(&JobId::new("j"), Unit::new(1, "keep me"), &CancellationToken::new())
            .await;

        assert_eq!(result.content, "keep me");
        assert_eq!(
            result.outcome,
            UnitOutcome::Degraded {
                attempts: 3,
                reason: "c".into()
            }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_stops_retrying() {
        let provider = ScriptedProvider::with_script(vec![Err(ProviderError::permanent("400"))]);
        let result = processor(provider.clone())
            .process(&JobId::new("j"), Unit::new(1, "text"), &CancellationToken::new())
            .await;

        assert!(result.outcome.is_degraded());
        assert_eq!(result.outcome.attempts(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt() {
        let provider = ScriptedProvider::with_script(vec![]);
        let token = CancellationToken::new();
        token.cancel();
        let result = processor(provider.clone())
            .process(&JobId::new("j"), Unit::new(5, "original"), &token)
            .await;

        assert_eq!(result.content, "original");
        assert_eq!(result.outcome, UnitOutcome::Cancelled);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff_stops_next_attempt() {
        let provider = ScriptedProvider::with_script(vec![Err(ProviderError::transient("503"))]);
        let token = CancellationToken::new();
        let processor = processor(provider.clone());

        let task = {
            let token = token.clone();
            tokio::spawn(async move {
                processor
                    .process(&JobId::new("j"), Unit::new(0, "original"), &token)
                    .await
            })
        };

        // Let the first attempt fail and enter backoff
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let result = task.await.unwrap();
        assert_eq!(result.outcome, UnitOutcome::Cancelled);
        assert_eq!(result.content, "original");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
