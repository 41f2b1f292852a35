//! The task adapter contract the host schedules.

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::error::TaskError;
use crate::report::TaskReport;

/// Static metadata describing a task type.
///
/// The host normalizes `key` into a registry key at registration time, so
/// adapters may use any spelling that normalizes cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskMetadata {
    /// Unique key identifying this task type (e.g. `"certification_activation"`).
    pub key: String,
    /// Human-readable display name.
    pub name: String,
    /// Short description of what this task does.
    pub description: String,
    /// Category for grouping in operator tooling (e.g. `"certifications"`).
    pub category: String,
}

impl TaskMetadata {
    /// Create metadata with the minimum required fields.
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: description.into(),
            category: String::new(),
        }
    }

    /// Set the grouping category for this task.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// A schedulable task.
///
/// Adapters are thin: they validate invocation arguments, shape the record
/// query, and delegate the iteration itself to the batch executor. Real
/// business work lives behind collaborator services.
#[async_trait]
pub trait TaskAdapter: Send + Sync {
    /// The task's static metadata.
    fn metadata(&self) -> &TaskMetadata;

    /// Execute one run of this task.
    ///
    /// Configuration failures surface as `Err`; everything that happens
    /// once the batch loop is running lands in the returned report instead.
    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError>;

    /// Whether this task honors termination requests.
    ///
    /// Tasks that must not stop mid-batch (short runs whose partial state
    /// is worse than completion) return `false`; the host then declines
    /// termination requests without touching the cancellation token.
    fn supports_terminate(&self) -> bool {
        true
    }
}
