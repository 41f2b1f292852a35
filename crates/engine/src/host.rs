//! Task registration, launching, and termination.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use warden_core::{RunId, TaskKey};
use warden_task::{
    ATTR_RECORDS_FAILED, ATTR_RECORDS_PROCESSED, ATTR_RECORDS_SKIPPED, RecordStore, RunStatus,
    TaskAdapter, TaskArgs, TaskContext, TaskOutcome, TaskReport,
};
use warden_telemetry::event::{EventBus, TaskEvent};
use warden_telemetry::metrics::MetricsRegistry;

use crate::error::EngineError;

/// Bookkeeping for one live run.
struct RunHandle {
    task: TaskKey,
    cancellation: CancellationToken,
    supports_terminate: bool,
    started_at: DateTime<Utc>,
}

/// A currently-executing run, as reported by [`TaskHost::active_runs`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRun {
    /// The run identifier.
    pub run_id: RunId,
    /// The task being run.
    pub task: TaskKey,
    /// When the run was launched.
    pub started_at: DateTime<Utc>,
}

/// Registry and launch surface for task adapters.
///
/// The host owns the pieces every run needs (store, events, metrics),
/// keys adapters by their normalized task key, and tracks live runs so
/// termination requests can find their cancellation token.
pub struct TaskHost {
    store: Arc<dyn RecordStore>,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRegistry>,
    adapters: DashMap<TaskKey, Arc<dyn TaskAdapter>>,
    active: DashMap<RunId, RunHandle>,
}

impl TaskHost {
    /// Create a host over the given store and telemetry.
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        events: Arc<EventBus>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            store,
            events,
            metrics,
            adapters: DashMap::new(),
            active: DashMap::new(),
        }
    }

    /// Register a task adapter under its metadata key.
    ///
    /// The key is normalized the way all task keys are; registering two
    /// adapters that normalize to the same key is an error.
    pub fn register(&self, adapter: Arc<dyn TaskAdapter>) -> Result<TaskKey, EngineError> {
        let key: TaskKey = adapter.metadata().key.parse()?;
        if self.adapters.contains_key(&key) {
            return Err(EngineError::DuplicateTask {
                key: key.to_string(),
            });
        }
        tracing::debug!(task = %key, name = %adapter.metadata().name, "registered task");
        self.adapters.insert(key.clone(), adapter);
        Ok(key)
    }

    /// Registered task keys, sorted.
    #[must_use]
    pub fn tasks(&self) -> Vec<TaskKey> {
        let mut keys: Vec<TaskKey> = self.adapters.iter().map(|e| e.key().clone()).collect();
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }

    /// Launch a run of the task registered under `key` and wait for it.
    ///
    /// Configuration errors from the adapter do not escape: they are
    /// converted into a failed report with a single error message and
    /// zeroed counters, exactly as a mid-run failure would be reported.
    pub async fn launch(&self, key: &str, args: TaskArgs) -> Result<TaskReport, EngineError> {
        let task: TaskKey = key.parse()?;
        let adapter = self
            .adapters
            .get(&task)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::UnknownTask {
                key: task.to_string(),
            })?;

        let ctx = TaskContext::new(task.clone(), args, Arc::clone(&self.store));
        let run_id = ctx.run_id();
        self.active.insert(
            run_id,
            RunHandle {
                task: task.clone(),
                cancellation: ctx.cancellation().clone(),
                supports_terminate: adapter.supports_terminate(),
                started_at: ctx.launched_at(),
            },
        );
        tracing::info!(run_id = %run_id, task = %task, "launching run");

        let result = adapter.execute(&ctx).await;
        self.active.remove(&run_id);

        let report = match result {
            Ok(report) => report,
            Err(err) => self.failure_report(&ctx, &err.to_string()),
        };

        // The report is the source of truth; losing the persisted copy is
        // an operational problem, not a reason to fail the finished run.
        if let Err(err) = self.store.persist_report(&report).await {
            tracing::error!(run_id = %run_id, %err, "persisting task report failed");
        }

        Ok(report)
    }

    /// Request cooperative termination of a live run.
    ///
    /// Returns `true` if the request was accepted. Requests are declined
    /// when the run is unknown, already finished, or its task does not
    /// support termination.
    pub fn terminate(&self, run_id: RunId) -> bool {
        let Some(handle) = self.active.get(&run_id) else {
            return false;
        };
        if !handle.supports_terminate {
            tracing::info!(run_id = %run_id, task = %handle.task, "termination declined");
            return false;
        }
        tracing::info!(run_id = %run_id, task = %handle.task, "termination requested");
        handle.cancellation.cancel();
        true
    }

    /// Whether a run is currently executing.
    #[must_use]
    pub fn is_active(&self, run_id: RunId) -> bool {
        self.active.contains_key(&run_id)
    }

    /// All currently-executing runs, oldest first.
    #[must_use]
    pub fn active_runs(&self) -> Vec<ActiveRun> {
        let mut runs: Vec<ActiveRun> = self
            .active
            .iter()
            .map(|entry| ActiveRun {
                run_id: *entry.key(),
                task: entry.value().task.clone(),
                started_at: entry.value().started_at,
            })
            .collect();
        runs.sort_by_key(|run| run.started_at);
        runs
    }

    /// Build the failed report for a run that never reached the batch loop.
    fn failure_report(&self, ctx: &TaskContext, error: &str) -> TaskReport {
        let mut outcome = TaskOutcome::new();
        outcome.error(error);
        outcome.set_attribute(ATTR_RECORDS_PROCESSED, serde_json::json!(0));
        outcome.set_attribute(ATTR_RECORDS_SKIPPED, serde_json::json!(0));
        outcome.set_attribute(ATTR_RECORDS_FAILED, serde_json::json!(0));

        self.events.emit(TaskEvent::Failed {
            run_id: ctx.run_id().to_string(),
            error: error.to_owned(),
        });
        self.metrics.counter("runs_failed_total").inc();

        let duration = (Utc::now() - ctx.launched_at()).to_std().unwrap_or_default();
        TaskReport {
            run_id: ctx.run_id(),
            task: ctx.task().clone(),
            status: RunStatus::Failed,
            outcome,
            duration,
        }
    }
}

impl std::fmt::Debug for TaskHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHost")
            .field("tasks", &self.adapters.len())
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}
