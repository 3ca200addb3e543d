//! Unit processing: the provider seam and the retrying processor around it.

mod command;
mod policy;
mod provider;
mod retry;

pub use command::CommandProvider;
pub use policy::{RetryPolicy, DEFAULT_BACKOFF_STEP, DEFAULT_MAX_ATTEMPTS};
pub use provider::{Provider, ProviderError};
pub use retry::RetryingUnitProcessor;
