//! Job lifecycle states and the transitions allowed between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a submission job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue for dispatch.
    Queued,
    /// A dispatch attempt is executing.
    Running,
    /// Blocked on external confirmation polling. A sub-state of running.
    Waiting,
    /// Terminal success.
    Succeeded,
    /// The attempt failed. Terminal once the retry budget is exhausted.
    Failed,
    /// Terminal cancellation.
    Cancelled,
}

impl JobStatus {
    /// Check if this status carries a final result.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Check if a dispatch attempt is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Waiting)
    }

    /// Check if the job can still be cancelled from this status.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Waiting)
    }

    /// Check whether a transition to `target` is allowed.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        matches!(
            (self, target),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Cancelled)
                | (Self::Running, Self::Waiting)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
                | (Self::Running, Self::Queued)
                | (Self::Waiting, Self::Running)
                | (Self::Waiting, Self::Succeeded)
                | (Self::Waiting, Self::Failed)
                | (Self::Waiting, Self::Cancelled)
                | (Self::Waiting, Self::Queued)
                | (Self::Failed, Self::Queued)
        )
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Waiting => write!(f, "waiting"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "waiting" => Ok(Self::Waiting),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}
