//! The final report of a task run.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_core::{RunId, TaskKey};

use crate::outcome::TaskOutcome;
use crate::status::RunStatus;

/// The durable record of one finished task run.
///
/// Produced by the executor, decorated by the task adapter, and persisted
/// by the host after the run ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    /// Unique run identifier.
    pub run_id: RunId,
    /// The task that ran.
    pub task: TaskKey,
    /// Final run status.
    pub status: RunStatus,
    /// Messages, attributes, and the terminated flag.
    pub outcome: TaskOutcome,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl TaskReport {
    /// Whether the run finished naturally with all records drawn.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the run was aborted by a fatal error.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Whether the run stopped on a termination request.
    #[must_use]
    pub fn was_terminated(&self) -> bool {
        self.outcome.terminated()
    }
}
