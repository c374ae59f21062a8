/// Job status definitions for tracking crawl job lifecycle
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current status of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job has been accepted but no worker has started yet
    Pending,

    /// Workers are fetching the seed page or downloading resources
    Running,

    // ===== Terminal States =====
    /// Queue drained with no in-flight task left
    Completed,

    /// Cancellation was requested and all workers drained
    Cancelled,

    /// Job-fatal error (seed page unreachable, save root not writable)
    Failed,
}

impl JobStatus {
    /// Returns true if no further transition can happen from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Returns true if the job is still making progress
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Lowercase string form, as used in manifests and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// Terminal statuses never transition again. `Pending` may jump straight
    /// to a terminal status when the job fails or is cancelled before its
    /// workers start.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            Self::Pending => next != Self::Pending,
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
