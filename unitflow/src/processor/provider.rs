//! The external text-transformation capability.

use std::future::Future;
use thiserror::Error;

/// Transforms the content of a single unit (translation, text extraction, ...).
///
/// Only [`RetryingUnitProcessor`](super::RetryingUnitProcessor) calls a
/// provider directly. Calls may fail transiently; the processor retries
/// retryable errors and degrades the unit when attempts run out.
///
/// # Cancellation
///
/// A call that has started is never interrupted by job cancellation.
/// Cancellation is observed at the next attempt boundary. A provider that
/// needs tighter cancellation has to make its own I/O cancellable.
///
/// # Example
///
/// ```
/// use unitflow::processor::{Provider, ProviderError};
///
/// struct Shout;
///
/// impl Provider for Shout {
///     async fn process(&self, text: &str) -> Result<String, ProviderError> {
///         Ok(text.to_uppercase())
///     }
///
///     fn name(&self) -> &str {
///         "shout"
///     }
/// }
/// ```
pub trait Provider: Send + Sync + 'static {
    /// Transforms one unit's text.
    fn process(&self, text: &str) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Returns the provider name for logging.
    fn name(&self) -> &str;
}

/// Error returned by a provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// Human-readable error message.
    pub message: String,
    /// Whether a later attempt might succeed.
    pub retryable: bool,
}

impl ProviderError {
    /// A transient failure (timeout, rate limit, 5xx).
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// A failure that will not go away on retry.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}
