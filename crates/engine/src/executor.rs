//! Batch run executor.
//!
//! Drives one run end-to-end: streams records from the store, applies the
//! per-record operation inside a session, commits on a cadence, evicts the
//! session cache to keep memory flat, throttles progress persistence, and
//! accumulates everything into the final report.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use warden_core::RunId;
use warden_task::{
    ATTR_RECORDS_FAILED, ATTR_RECORDS_PROCESSED, ATTR_RECORDS_SKIPPED, CacheEvictor,
    DEFAULT_EVICTION_THRESHOLD, DEFAULT_PERSIST_INTERVAL, DEFAULT_STATUS_CAP, MessageKind,
    ProgressMonitor, ProgressSink, ProgressSnapshot, Record, RecordDisposition, RecordOperation,
    RecordQuery, RecordSource, RecordStore, RunStatus, StoreError, StoreSession, TaskArgs,
    TaskContext, TaskOutcome, TaskReport, validate_transition,
};
use warden_telemetry::event::{EventBus, TaskEvent};
use warden_telemetry::metrics::MetricsRegistry;

/// Invocation argument overriding [`BatchConfig::eviction_threshold`].
pub const ARG_EVICTION_THRESHOLD: &str = "eviction_threshold";
/// Invocation argument overriding [`BatchConfig::commit_every`].
pub const ARG_COMMIT_EVERY: &str = "commit_every";
/// Invocation argument overriding [`BatchConfig::max_record_failures`].
pub const ARG_MAX_RECORD_FAILURES: &str = "max_record_failures";

/// Tuning knobs for a batch run.
///
/// The executor's own config supplies the defaults; individual launches
/// can override the cadence knobs through invocation arguments.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Committed records between session cache evictions.
    pub eviction_threshold: u32,
    /// Cleanly handled records between commits (`0` behaves like `1`).
    pub commit_every: u32,
    /// Persisted status text cap, in characters.
    pub status_cap: usize,
    /// Minimum interval between persisted progress snapshots.
    pub progress_interval: Duration,
    /// Abort the run once more than this many records have failed
    /// recoverably. `None` disables the budget.
    pub max_record_failures: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
            commit_every: 1,
            status_cap: DEFAULT_STATUS_CAP,
            progress_interval: DEFAULT_PERSIST_INTERVAL,
            max_record_failures: None,
        }
    }
}

impl BatchConfig {
    /// Apply per-launch argument overrides on top of this config.
    fn overridden_by(&self, args: &TaskArgs) -> Self {
        let mut config = self.clone();
        if let Some(n) = args.get_i64(ARG_EVICTION_THRESHOLD) {
            config.eviction_threshold = u32::try_from(n.max(1)).unwrap_or(u32::MAX);
        }
        if let Some(n) = args.get_i64(ARG_COMMIT_EVERY) {
            config.commit_every = u32::try_from(n.max(1)).unwrap_or(u32::MAX);
        }
        if let Some(n) = args.get_i64(ARG_MAX_RECORD_FAILURES) {
            config.max_record_failures = u64::try_from(n).ok();
        }
        config
    }
}

/// Adapts the run's store into a progress sink.
struct StoreSink {
    store: Arc<dyn RecordStore>,
}

#[async_trait]
impl ProgressSink for StoreSink {
    async fn persist_progress(
        &self,
        run_id: RunId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError> {
        self.store.persist_progress(run_id, snapshot).await
    }
}

/// Cleanly handled records not yet covered by a commit.
#[derive(Default)]
struct Pending {
    processed: u32,
    skipped: u32,
}

impl Pending {
    fn total(&self) -> u32 {
        self.processed + self.skipped
    }
}

/// Committed per-run counters.
#[derive(Default)]
struct Tallies {
    seen: u64,
    processed: u64,
    skipped: u64,
    failures: u64,
}

/// The batch run executor.
///
/// Orchestrates one run of a record operation by:
///
/// 1. Opening a record source and a store session
/// 2. Drawing records one at a time, never materializing the set
/// 3. Updating throttled progress before each record
/// 4. Committing staged work on the commit cadence
/// 5. Evicting the session cache on the eviction cadence, after commits
/// 6. Continuing past recoverable record failures, aborting on fatal ones
/// 7. Emitting telemetry and building the final [`TaskReport`]
pub struct BatchExecutor {
    config: BatchConfig,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRegistry>,
}

impl BatchExecutor {
    /// Create an executor with the default [`BatchConfig`].
    #[must_use]
    pub fn new(events: Arc<EventBus>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            config: BatchConfig::default(),
            events,
            metrics,
        }
    }

    /// Replace the default config.
    #[must_use]
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one batch to completion.
    ///
    /// Infallible by design: every failure mode ends up in the returned
    /// report rather than escaping, so a crashed connector and a clean
    /// finish travel the same path back to the host.
    pub async fn run(
        &self,
        ctx: &TaskContext,
        query: &RecordQuery,
        op: &dyn RecordOperation,
    ) -> TaskReport {
        let started = Instant::now();
        let config = self.config.overridden_by(ctx.args());
        let run_id = ctx.run_id();

        // 1. Enter the running state.
        let mut status = advance(RunStatus::Pending, RunStatus::Running);

        // 2. Announce the run.
        tracing::info!(
            run_id = %run_id,
            task = %ctx.task(),
            category = %query.category,
            "starting batch run"
        );
        self.events.emit(TaskEvent::Started {
            run_id: run_id.to_string(),
            task: ctx.task().to_string(),
        });
        self.metrics.counter("runs_started_total").inc();
        self.metrics.gauge("runs_active").inc();

        // 3. Set up throttled progress reporting.
        let sink = Arc::new(StoreSink {
            store: Arc::clone(ctx.store()),
        });
        let mut monitor = ProgressMonitor::new(run_id, sink)
            .with_cap(config.status_cap)
            .with_interval(config.progress_interval);

        // 4. Drive the record loop.
        let mut outcome = TaskOutcome::new();
        let mut tallies = Tallies::default();
        let final_status = self
            .drive(ctx, query, op, &config, &mut monitor, &mut outcome, &mut tallies)
            .await;
        status = advance(status, final_status);

        // 5. Close out progress; a failed final snapshot never fails the run.
        if let Err(err) = monitor.complete().await {
            tracing::warn!(run_id = %run_id, %err, "persisting final progress failed");
            self.metrics.counter("progress_persist_failures_total").inc();
        }

        // 6. Fold the counters into the outcome.
        outcome.set_attribute(ATTR_RECORDS_PROCESSED, serde_json::json!(tallies.processed));
        outcome.set_attribute(ATTR_RECORDS_SKIPPED, serde_json::json!(tallies.skipped));
        outcome.set_attribute(ATTR_RECORDS_FAILED, serde_json::json!(tallies.failures));
        outcome.set_terminated(status == RunStatus::Terminated);

        // 7. Emit the final event and metrics.
        let elapsed = started.elapsed();
        self.emit_final_event(run_id, status, elapsed, &outcome, &tallies);
        self.metrics.gauge("runs_active").dec();

        tracing::info!(
            run_id = %run_id,
            %status,
            processed = tallies.processed,
            skipped = tallies.skipped,
            failures = tallies.failures,
            duration_ms = elapsed.as_millis() as u64,
            "batch run finished"
        );

        TaskReport {
            run_id,
            task: ctx.task().clone(),
            status,
            outcome,
            duration: elapsed,
        }
    }

    /// The record loop. Returns the terminal status for this run.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        ctx: &TaskContext,
        query: &RecordQuery,
        op: &dyn RecordOperation,
        config: &BatchConfig,
        monitor: &mut ProgressMonitor,
        outcome: &mut TaskOutcome,
        tallies: &mut Tallies,
    ) -> RunStatus {
        let mut source = match ctx.store().stream(query).await {
            Ok(source) => source,
            Err(err) => {
                outcome.error(format!("opening record stream failed: {err}"));
                return RunStatus::Failed;
            }
        };
        let session = match ctx.store().session().await {
            Ok(session) => session,
            Err(err) => {
                outcome.error(format!("opening store session failed: {err}"));
                return RunStatus::Failed;
            }
        };

        let total = source.size_hint();
        let mut evictor =
            CacheEvictor::new(Arc::clone(&session)).with_threshold(config.eviction_threshold);
        let mut pending = Pending::default();

        loop {
            // Termination is honored at record boundaries only: staged work
            // is flushed, the current record is never split.
            if ctx.is_cancelled() {
                return match flush(&session, &mut evictor, &mut pending, tallies).await {
                    Ok(()) => {
                        tracing::info!(run_id = %ctx.run_id(), "run terminated at record boundary");
                        RunStatus::Terminated
                    }
                    Err(err) => {
                        outcome.error(format!("commit failed: {err}"));
                        RunStatus::Failed
                    }
                };
            }

            let record = match source.next().await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    // Natural end: flush whatever the cadence left uncommitted.
                    return match flush(&session, &mut evictor, &mut pending, tallies).await {
                        Ok(()) => RunStatus::Completed,
                        Err(err) => {
                            outcome.error(format!("commit failed: {err}"));
                            RunStatus::Failed
                        }
                    };
                }
                Err(err) => {
                    outcome.error(format!("drawing next record failed: {err}"));
                    return RunStatus::Failed;
                }
            };

            tallies.seen += 1;
            self.report_progress(ctx, monitor, op, &record, tallies.seen, total).await;

            match op.process(&record, session.as_ref(), ctx).await {
                Ok(RecordDisposition::Processed) => pending.processed += 1,
                Ok(RecordDisposition::Skipped) => pending.skipped += 1,
                Err(err) if err.is_recoverable() => {
                    tallies.failures += 1;
                    tracing::warn!(
                        run_id = %ctx.run_id(),
                        record = %record.name,
                        %err,
                        "record failed, continuing"
                    );
                    outcome.error(format!("{}: {err}", record.name));
                    self.events.emit(TaskEvent::RecordFailed {
                        run_id: ctx.run_id().to_string(),
                        record: record.name.clone(),
                        error: err.to_string(),
                    });
                    self.metrics.counter("records_failed_total").inc();

                    if let Some(budget) = config.max_record_failures
                        && tallies.failures > budget
                    {
                        outcome.error(format!(
                            "record failure budget exceeded: {} failures (budget {budget})",
                            tallies.failures
                        ));
                        return RunStatus::Failed;
                    }
                    continue;
                }
                Err(err) => {
                    // Fatal: committed work stands, the staged tail is abandoned.
                    tracing::error!(
                        run_id = %ctx.run_id(),
                        record = %record.name,
                        %err,
                        "fatal record error, aborting run"
                    );
                    outcome.error(format!("{}: {err}", record.name));
                    return RunStatus::Failed;
                }
            }

            if pending.total() >= config.commit_every
                && let Err(err) = flush(&session, &mut evictor, &mut pending, tallies).await
            {
                outcome.error(format!("commit failed: {err}"));
                return RunStatus::Failed;
            }
        }
    }

    /// Update the progress monitor for the record about to be processed.
    async fn report_progress(
        &self,
        ctx: &TaskContext,
        monitor: &mut ProgressMonitor,
        op: &dyn RecordOperation,
        record: &Record,
        seen: u64,
        total: Option<u64>,
    ) {
        let result = match total {
            Some(total) if total > 0 => {
                let text = format!("{} [{seen}] of [{total}]", op.describe(record));
                let percent = (seen.saturating_mul(100) / total).min(100) as u8;
                monitor.update_with_percent(text, percent).await
            }
            _ => monitor.update(format!("{} [{seen}]", op.describe(record))).await,
        };

        // A broken progress table must not take down the run itself.
        if let Err(err) = result {
            tracing::warn!(run_id = %ctx.run_id(), %err, "persisting progress failed");
            self.metrics.counter("progress_persist_failures_total").inc();
        }
    }

    /// Emit the final run event and record metrics.
    fn emit_final_event(
        &self,
        run_id: RunId,
        status: RunStatus,
        elapsed: Duration,
        outcome: &TaskOutcome,
        tallies: &Tallies,
    ) {
        match status {
            RunStatus::Completed => {
                self.events.emit(TaskEvent::Completed {
                    run_id: run_id.to_string(),
                    duration: elapsed,
                    processed: tallies.processed,
                });
                self.metrics.counter("runs_completed_total").inc();
            }
            RunStatus::Terminated => {
                self.events.emit(TaskEvent::Terminated {
                    run_id: run_id.to_string(),
                    processed: tallies.processed,
                });
                self.metrics.counter("runs_terminated_total").inc();
            }
            RunStatus::Failed => {
                let error = outcome
                    .messages()
                    .iter()
                    .rev()
                    .find(|m| m.kind == MessageKind::Error)
                    .map(|m| m.text.clone())
                    .unwrap_or_default();
                self.events.emit(TaskEvent::Failed {
                    run_id: run_id.to_string(),
                    error,
                });
                self.metrics.counter("runs_failed_total").inc();
            }
            RunStatus::Pending | RunStatus::Running => {}
        }

        self.metrics.counter("records_processed_total").inc_by(tallies.processed);
        self.metrics.counter("records_skipped_total").inc_by(tallies.skipped);
        self.metrics.histogram("run_duration_seconds").observe(elapsed.as_secs_f64());
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Apply a validated status transition, keeping the current status if the
/// transition is illegal.
fn advance(current: RunStatus, to: RunStatus) -> RunStatus {
    match validate_transition(current, to) {
        Ok(()) => to,
        Err(err) => {
            tracing::error!(%err, "refusing invalid run transition");
            current
        }
    }
}

/// Commit staged work, then advance committed tallies and the eviction
/// cadence for every record the commit covered.
async fn flush(
    session: &Arc<dyn StoreSession>,
    evictor: &mut CacheEvictor,
    pending: &mut Pending,
    tallies: &mut Tallies,
) -> Result<(), StoreError> {
    if pending.total() == 0 {
        return Ok(());
    }
    session.commit().await?;
    tallies.processed += u64::from(pending.processed);
    tallies.skipped += u64::from(pending.skipped);
    for _ in 0..pending.total() {
        evictor.increment();
    }
    *pending = Pending::default();
    Ok(())
}
