//! Per-run execution context.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use warden_core::{RunId, TaskKey};

use crate::args::TaskArgs;
use crate::error::TaskError;
use crate::store::RecordStore;

/// Everything a task needs while it runs.
///
/// Created by the host per launch and handed to the adapter by shared
/// reference. The cancellation token is the cooperative termination
/// channel: cancelling it asks the run to stop at the next record
/// boundary, it never aborts work mid-record.
pub struct TaskContext {
    run_id: RunId,
    task: TaskKey,
    args: TaskArgs,
    store: Arc<dyn RecordStore>,
    cancellation: CancellationToken,
    launched_at: DateTime<Utc>,
}

impl TaskContext {
    /// Create a context for a fresh run with its own cancellation token.
    #[must_use]
    pub fn new(task: TaskKey, args: TaskArgs, store: Arc<dyn RecordStore>) -> Self {
        Self {
            run_id: RunId::v4(),
            task,
            args,
            store,
            cancellation: CancellationToken::new(),
            launched_at: Utc::now(),
        }
    }

    /// Replace the cancellation token, linking this run to an external one.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The unique identifier of this run.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The key of the task being run.
    #[must_use]
    pub fn task(&self) -> &TaskKey {
        &self.task
    }

    /// Launch arguments.
    #[must_use]
    pub fn args(&self) -> &TaskArgs {
        &self.args
    }

    /// The record store backing this run.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// When the run was launched.
    #[must_use]
    pub fn launched_at(&self) -> DateTime<Utc> {
        self.launched_at
    }

    /// Whether termination has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with [`TaskError::Cancelled`] if termination has been requested.
    pub fn check_cancelled(&self) -> Result<(), TaskError> {
        if self.cancellation.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("run_id", &self.run_id)
            .field("task", &self.task)
            .field("args", &self.args)
            .field("launched_at", &self.launched_at)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
