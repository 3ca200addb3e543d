//! Job and unit types.
//!
//! A job is an ordered sequence of [`Unit`]s identified by a [`JobId`]. Each
//! unit is processed independently and resolves to a [`ProcessedUnit`]
//! carrying an explicit [`UnitOutcome`], so callers can tell full success
//! apart from degraded or cancelled output.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique job IDs.
static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a job.
///
/// Job IDs are opaque strings. Callers usually derive them from the record
/// being processed (a note or document id) so that a resubmission of the same
/// record replaces the earlier job.
///
/// # Example
///
/// ```
/// use unitflow::job::JobId;
///
/// let id = JobId::new("note-42");
/// assert_eq!(id.as_str(), "note-42");
///
/// let auto = JobId::auto();
/// assert!(auto.as_str().starts_with("job-"));
/// ```
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct JobId(String);

impl JobId {
    /// Creates a new job ID with the given string value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a unique auto-generated job ID of the form `job-{counter}`.
    pub fn auto() -> Self {
        let counter = JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("job-{}", counter))
    }

    /// Returns the string value of this job ID.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The smallest independently processable piece of a job (a page or a chunk).
///
/// The `index` defines reassembly order and must be unique within a job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unit {
    pub index: u64,
    pub content: String,
}

impl Unit {
    pub fn new(index: u64, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
        }
    }

    /// Size of the unit's content in bytes, used for batch sizing.
    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }
}

/// Live status of a unit while its job runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnitStatus {
    /// Not yet picked up by a worker.
    #[default]
    Pending,
    /// A worker is calling the provider for this unit.
    InFlight,
    Succeeded,
    /// All attempts failed; the original content stands in for the result.
    Degraded,
    /// Dropped before completion because the job was cancelled.
    Cancelled,
}

impl UnitStatus {
    /// Returns true once the unit can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Degraded | Self::Cancelled)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InFlight => write!(f, "InFlight"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How a unit was resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    /// The first attempt succeeded.
    Succeeded,
    /// A later attempt succeeded after earlier failures.
    SucceededAfterRetry { attempts: u32 },
    /// Every attempt failed (or a permanent error was hit); the original
    /// content was kept.
    Degraded { attempts: u32, reason: String },
    /// The job was cancelled before this unit completed; the original content
    /// was kept.
    Cancelled,
}

impl UnitOutcome {
    /// Number of provider attempts made for the unit.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded => 1,
            Self::SucceededAfterRetry { attempts } | Self::Degraded { attempts, .. } => *attempts,
            Self::Cancelled => 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::SucceededAfterRetry { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The terminal [`UnitStatus`] matching this outcome.
    pub fn status(&self) -> UnitStatus {
        match self {
            Self::Succeeded | Self::SucceededAfterRetry { .. } => UnitStatus::Succeeded,
            Self::Degraded { .. } => UnitStatus::Degraded,
            Self::Cancelled => UnitStatus::Cancelled,
        }
    }
}

/// A unit after processing: its index, resulting content, and outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessedUnit {
    pub index: u64,
    pub content: String,
    pub outcome: UnitOutcome,
}

impl ProcessedUnit {
    /// A unit that never ran because its job was cancelled.
    pub fn cancelled(unit: Unit) -> Self {
        Self {
            index: unit.index,
            content: unit.content,
            outcome: UnitOutcome::Cancelled,
        }
    }

    /// A unit that fell back to its original content.
    pub fn degraded(unit: Unit, attempts: u32, reason: impl Into<String>) -> Self {
        Self {
            index: unit.index,
            content: unit.content,
            outcome: UnitOutcome::Degraded {
                attempts,
                reason: reason.into(),
            },
        }
    }
}

/// Lifecycle state of a job.
///
/// ```text
/// Created → Registered → {Dispatching → Awaiting → Collecting}* → Finalizing
///                                                        → Completed | Cancelled
/// ```
///
/// The batching triple repeats once per planned batch; `batch` is the
/// one-based batch number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JobStatus {
    #[default]
    Created,
    Registered,
    Dispatching { batch: usize },
    Awaiting { batch: usize },
    Collecting { batch: usize },
    Finalizing,
    Completed,
    Cancelled,
}

impl JobStatus {
    /// Returns true for `Completed` and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns true while the job is inside its batching loop.
    pub fn is_batching(&self) -> bool {
        matches!(
            self,
            Self::Dispatching { .. } | Self::Awaiting { .. } | Self::Collecting { .. }
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Registered => write!(f, "Registered"),
            Self::Dispatching { batch } => write!(f, "Dispatching(batch {})", batch),
            Self::Awaiting { batch } => write!(f, "Awaiting(batch {})", batch),
            Self::Collecting { batch } => write!(f, "Collecting(batch {})", batch),
            Self::Finalizing => write!(f, "Finalizing"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
