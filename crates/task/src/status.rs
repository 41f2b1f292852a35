//! Run-level status tracking and transition validation.

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// The overall status of a task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but not yet started.
    Pending,
    /// Actively drawing and processing records.
    Running,
    /// All records drawn; the run finished naturally.
    Completed,
    /// Stopped cooperatively after a termination request.
    Terminated,
    /// Aborted by a fatal error; committed work stands.
    Failed,
}

impl RunStatus {
    /// Returns `true` if the run has reached a final state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated | Self::Failed)
    }

    /// Returns `true` if the run is currently doing work.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the run finished naturally with all records drawn.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if the run was aborted by a fatal error.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Returns `true` if the run-level transition from `from` to `to` is valid.
///
/// `Pending → Failed` covers runs rejected before their loop starts, for
/// example by a configuration error.
#[must_use]
pub fn can_transition(from: RunStatus, to: RunStatus) -> bool {
    matches!(
        (from, to),
        (RunStatus::Pending, RunStatus::Running)
            | (RunStatus::Pending, RunStatus::Failed)
            | (RunStatus::Running, RunStatus::Completed)
            | (RunStatus::Running, RunStatus::Terminated)
            | (RunStatus::Running, RunStatus::Failed)
    )
}

/// Validate a run-level transition, returning an error if invalid.
pub fn validate_transition(from: RunStatus, to: RunStatus) -> Result<(), TaskError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TaskError::invalid_transition(from, to))
    }
}
