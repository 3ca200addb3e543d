//! Job registry: which jobs are active and which are cancelled.
//!
//! The registry is an explicit service, constructed once and shared as an
//! `Arc<JobRegistry>` with every component that needs to see cancellation.
//! All mutation happens under a single coarse mutex guarding two maps; the
//! per-unit hot path never takes it. Instead, each registration hands out a
//! [`CancellationToken`] that workers poll lock-free.
//!
//! # Epochs
//!
//! Every `register` starts a new epoch for the id. Registering an id that is
//! already active cancels the previous epoch's token, so work belonging to the
//! replaced job stops at its next cancellation check. [`JobRegistry::release`]
//! only removes the registration when the epoch still matches, which keeps a
//! replaced job's late cleanup from unregistering its successor.

use crate::job::JobId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Proof of registration for one epoch of a job.
#[derive(Clone, Debug)]
pub struct Registration {
    job_id: JobId,
    epoch: u64,
    token: CancellationToken,
}

impl Registration {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Token cancelled when this epoch is cancelled or replaced.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Lock-free cancellation check for this epoch.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct ActiveEntry {
    epoch: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct RegistryState {
    active: HashMap<JobId, ActiveEntry>,
    cancelled: HashSet<JobId>,
    next_epoch: u64,
}

/// Tracks active and cancelled job ids.
#[derive(Debug, Default)]
pub struct JobRegistry {
    state: Mutex<RegistryState>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job, starting a fresh epoch.
    ///
    /// Any prior cancellation for the id is cleared. If the id was already
    /// active, the previous epoch's token is cancelled.
    pub fn register(&self, job_id: &JobId) -> Registration {
        let mut state = self.state.lock();
        let epoch = state.next_epoch;
        state.next_epoch += 1;

        let token = CancellationToken::new();
        let previous = state.active.insert(
            job_id.clone(),
            ActiveEntry {
                epoch,
                token: token.clone(),
            },
        );
        state.cancelled.remove(job_id);

        if let Some(previous) = previous {
            previous.token.cancel();
            info!(
                job_id = %job_id,
                replaced_epoch = previous.epoch,
                epoch,
                "Replaced active job registration"
            );
        } else {
            debug!(job_id = %job_id, epoch, "Registered job");
        }

        Registration {
            job_id: job_id.clone(),
            epoch,
            token,
        }
    }

    /// Removes the registration and any cancellation flag for the id,
    /// regardless of epoch.
    pub fn unregister(&self, job_id: &JobId) {
        let mut state = self.state.lock();
        state.active.remove(job_id);
        state.cancelled.remove(job_id);
        debug!(job_id = %job_id, "Unregistered job");
    }

    /// Unregisters the job only if `registration` is still the current epoch.
    ///
    /// Returns true if the registration was removed.
    pub fn release(&self, registration: &Registration) -> bool {
        let mut state = self.state.lock();
        let current = state
            .active
            .get(&registration.job_id)
            .is_some_and(|entry| entry.epoch == registration.epoch);

        if current {
            state.active.remove(&registration.job_id);
            state.cancelled.remove(&registration.job_id);
            debug!(
                job_id = %registration.job_id,
                epoch = registration.epoch,
                "Released job registration"
            );
        }
        current
    }

    /// Flags an active job as cancelled.
    ///
    /// Returns `false`, with no state change, if the id is not active.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let mut state = self.state.lock();
        let Some(entry) = state.active.get(job_id) else {
            warn!(job_id = %job_id, "Cancel requested for inactive job");
            return false;
        };
        entry.token.cancel();
        state.cancelled.insert(job_id.clone());
        info!(job_id = %job_id, "Job cancelled");
        true
    }

    /// Returns true if the id is flagged cancelled in its current epoch.
    pub fn is_cancelled(&self, job_id: &JobId) -> bool {
        self.state.lock().cancelled.contains(job_id)
    }

    /// Returns true if the id is currently registered.
    pub fn is_active(&self, job_id: &JobId) -> bool {
        self.state.lock().active.contains_key(job_id)
    }

    /// Cancellation token of the current epoch, if the id is registered.
    pub fn token(&self, job_id: &JobId) -> Option<CancellationToken> {
        self.state
            .lock()
            .active
            .get(job_id)
            .map(|entry| entry.token.clone())
    }

    pub fn list_active(&self) -> HashSet<JobId> {
        self.state.lock().active.keys().cloned().collect()
    }

    pub fn list_cancelled(&self) -> HashSet<JobId> {
        self.state.lock().cancelled.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_unknown_id_returns_false() {
        let registry = JobRegistry::new();
        assert!(!registry.cancel(&JobId::new("unknown-id")));
        assert!(registry.list_active().is_empty());
        assert!(registry.list_cancelled().is_empty());
        assert!(!registry.is_cancelled(&JobId::new("unknown-id")));
    }

    #[test]
    fn test_cancel_is_sticky_until_unregister() {
        let registry = JobRegistry::new();
        let id = JobId::new("doc");
        let registration = registry.register(&id);

        assert!(registry.cancel(&id));
        assert!(registry.is_cancelled(&id));
        assert!(registration.is_cancelled());
        // Cancelling again is still accepted while active
        assert!(registry.cancel(&id));
        assert!(registry.is_cancelled(&id));

        registry.unregister(&id);
        assert!(!registry.is_cancelled(&id));
        assert!(!registry.is_active(&id));
        assert!(!registry.cancel(&id));
    }

    #[test]
    fn test_register_clears_prior_cancellation() {
        let registry = JobRegistry::new();
        let id = JobId::new("doc");
        registry.register(&id);
        registry.cancel(&id);

        let fresh = registry.register(&id);
        assert!(!registry.is_cancelled(&id));
        assert!(!fresh.is_cancelled());
    }

    #[test]
    fn test_reregister_cancels_previous_epoch_token() {
        let registry = JobRegistry::new();
        let id = JobId::new("doc");
        let first = registry.register(&id);
        let second = registry.register(&id);

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(second.epoch() > first.epoch());
    }

    #[test]
    fn test_release_ignores_stale_epoch() {
        let registry = JobRegistry::new();
        let id = JobId::new("doc");
        let first = registry.register(&id);
        let second = registry.register(&id);

        assert!(!registry.release(&first));
        assert!(registry.is_active(&id));

        assert!(registry.release(&second));
        assert!(!registry.is_active(&id));
    }

    #[test]
    fn test_list_active_and_token() {
        let registry = JobRegistry::new();
        registry.register(&JobId::new("a"));
        registry.register(&JobId::new("b"));

        let active = registry.list_active();
        assert_eq!(active.len(), 2);
        assert!(active.contains(&JobId::new("a")));
        assert!(registry.token(&JobId::new("a")).is_some());
        assert!(registry.token(&JobId::new("c")).is_none());
    }
}
