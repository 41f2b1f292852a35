//! End-to-end integration tests for the batch engine.
//!
//! These tests exercise the full stack: host → adapter → executor → store,
//! with the in-memory backend providing session journals and fault
//! injection.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use warden_engine::{
    ARG_COMMIT_EVERY, ARG_EVICTION_THRESHOLD, ARG_MAX_RECORD_FAILURES, BatchConfig, BatchExecutor,
    EngineError, TaskHost,
};
use warden_store_memory::{MemoryStore, SessionOp};
use warden_task::{
    ATTR_RECORDS_FAILED, ATTR_RECORDS_PROCESSED, ATTR_RECORDS_SKIPPED, MessageKind, Record,
    RecordDisposition, RecordError, RecordOperation, RecordQuery, RecordStore, RunStatus,
    StoreSession, TaskAdapter, TaskArgs, TaskContext, TaskError, TaskMetadata, TaskReport,
};
use warden_telemetry::event::{EventBus, TaskEvent};
use warden_telemetry::metrics::MetricsRegistry;

// ---------------------------------------------------------------------------
// Test operation
// ---------------------------------------------------------------------------

/// Configurable record operation: saves a marker into each record's payload
/// and can be told to fail, skip, block, or cancel at chosen points.
#[derive(Default)]
struct TestOp {
    calls: AtomicU64,
    successes: AtomicU64,
    fail_names: Vec<String>,
    skip_names: Vec<String>,
    fatal_at: Option<u64>,
    cancel_after: Option<u64>,
    gate: Option<Arc<Semaphore>>,
    wait_for_cancel: bool,
    describe_text: Option<String>,
}

impl TestOp {
    fn new() -> Self {
        Self::default()
    }

    /// Fail recoverably on records with these names.
    fn failing(mut self, names: &[&str]) -> Self {
        self.fail_names = names.iter().map(ToString::to_string).collect();
        self
    }

    /// Skip records with these names.
    fn skipping(mut self, names: &[&str]) -> Self {
        self.skip_names = names.iter().map(ToString::to_string).collect();
        self
    }

    /// Fail fatally on the nth record drawn (1-based).
    fn fatal_on(mut self, n: u64) -> Self {
        self.fatal_at = Some(n);
        self
    }

    /// Cancel the run's token after the nth successful record.
    fn cancelling_after(mut self, n: u64) -> Self {
        self.cancel_after = Some(n);
        self
    }

    /// Block each record on a semaphore permit.
    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Block the first record until the run's token is cancelled.
    fn waiting_for_cancel(mut self) -> Self {
        self.wait_for_cancel = true;
        self
    }

    /// Use a fixed describe text instead of the record name.
    fn describing(mut self, text: impl Into<String>) -> Self {
        self.describe_text = Some(text.into());
        self
    }
}

#[async_trait]
impl RecordOperation for TestOp {
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }
        if self.wait_for_cancel {
            ctx.cancellation().cancelled().await;
        }

        if self.fatal_at == Some(call) {
            return Err(RecordError::fatal("connector schema mismatch"));
        }
        if self.fail_names.contains(&record.name) {
            return Err(RecordError::recoverable("identity has no manager"));
        }
        if self.skip_names.contains(&record.name) {
            return Ok(RecordDisposition::Skipped);
        }

        let mut updated = record.clone();
        updated.payload["processed"] = serde_json::json!(true);
        session
            .save(updated)
            .map_err(|e| RecordError::fatal(e.to_string()))?;

        let done = self.successes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.cancel_after == Some(done) {
            ctx.cancellation().cancel();
        }
        Ok(RecordDisposition::Processed)
    }

    fn describe(&self, record: &Record) -> String {
        match &self.describe_text {
            Some(text) => text.clone(),
            None => format!("Refreshing {}", record.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Test adapters
// ---------------------------------------------------------------------------

/// Minimal adapter: runs the executor over the `account` category.
struct RefreshAdapter {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    op: Arc<TestOp>,
}

impl RefreshAdapter {
    fn new(executor: Arc<BatchExecutor>, op: Arc<TestOp>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "account_refresh",
                "Account Refresh",
                "Refreshes account records from connected applications",
            ),
            executor,
            op,
        }
    }
}

#[async_trait]
impl TaskAdapter for RefreshAdapter {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let query = RecordQuery::category("account");
        Ok(self.executor.run(ctx, &query, self.op.as_ref()).await)
    }
}

/// Adapter requiring a `certification_group` argument.
struct StrictAdapter {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    op: Arc<TestOp>,
}

impl StrictAdapter {
    fn new(executor: Arc<BatchExecutor>, op: Arc<TestOp>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "certification_activation",
                "Certification Activation",
                "Activates staged certifications for a group",
            ),
            executor,
            op,
        }
    }
}

#[async_trait]
impl TaskAdapter for StrictAdapter {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let group = ctx.args().require_str("certification_group")?;
        let query = RecordQuery::category("certification")
            .with_constraint("group", serde_json::json!(group));
        Ok(self.executor.run(ctx, &query, self.op.as_ref()).await)
    }
}

/// Adapter that refuses termination requests.
struct PinnedAdapter {
    meta: TaskMetadata,
    executor: Arc<BatchExecutor>,
    op: Arc<TestOp>,
}

impl PinnedAdapter {
    fn new(executor: Arc<BatchExecutor>, op: Arc<TestOp>) -> Self {
        Self {
            meta: TaskMetadata::new(
                "retention_sweep",
                "Retention Sweep",
                "Short sweep whose partial state is worse than completion",
            ),
            executor,
            op,
        }
    }
}

#[async_trait]
impl TaskAdapter for PinnedAdapter {
    fn metadata(&self) -> &TaskMetadata {
        &self.meta
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let query = RecordQuery::category("account");
        Ok(self.executor.run(ctx, &query, self.op.as_ref()).await)
    }

    fn supports_terminate(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

fn telemetry() -> (Arc<EventBus>, Arc<MetricsRegistry>) {
    (Arc::new(EventBus::new(64)), Arc::new(MetricsRegistry::new()))
}

fn accounts(names: &[&str]) -> Vec<Record> {
    names
        .iter()
        .map(|name| Record::new(*name, serde_json::json!({ "application": "AD" })))
        .collect()
}

fn ctx_for(store: &Arc<MemoryStore>, args: TaskArgs) -> TaskContext {
    TaskContext::new(
        "account_refresh".parse().unwrap(),
        args,
        Arc::clone(store) as Arc<dyn RecordStore>,
    )
}

/// Eviction must never land between a save and the commit covering it.
fn assert_no_evict_with_staged(journal: &[SessionOp]) {
    let mut staged = 0usize;
    for op in journal {
        match op {
            SessionOp::Save => staged += 1,
            SessionOp::Commit => staged = 0,
            SessionOp::Evict => assert_eq!(staged, 0, "evicted with staged writes: {journal:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_records_threshold_two_commit_then_evict() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3", "a4", "a5"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics).with_config(BatchConfig {
        eviction_threshold: 2,
        ..BatchConfig::default()
    });

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(5));
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_FAILED), Some(0));
    assert!(!report.was_terminated());

    // Commit after every record; evictions after records 2 and 4, always
    // on the heels of a commit.
    let session = store.last_session().unwrap();
    use SessionOp::{Commit, Evict, Save};
    assert_eq!(
        session.journal(),
        vec![Save, Commit, Save, Commit, Evict, Save, Commit, Save, Commit, Evict, Save, Commit]
    );
    assert_eq!(session.commit_count(), 5);
    assert_eq!(session.evict_count(), 2);

    // Every record's mutation survived eviction.
    for record in store.records_in("account") {
        assert_eq!(record.payload["processed"], serde_json::json!(true));
    }
}

#[tokio::test]
async fn termination_stops_at_record_boundary() {
    let store = Arc::new(MemoryStore::new());
    store.seed(
        "account",
        accounts(&["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "a10"]),
    );
    let (events, metrics) = telemetry();
    let mut sub = events.subscribe();
    let executor = BatchExecutor::new(events, metrics);

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().cancelling_after(3),
        )
        .await;

    assert_eq!(report.status, RunStatus::Terminated);
    assert!(report.was_terminated());
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(3));

    // Work for the first three records is committed, the rest untouched.
    let saved: Vec<bool> = store
        .records_in("account")
        .iter()
        .map(|r| r.payload.get("processed").is_some())
        .collect();
    assert_eq!(
        saved,
        vec![true, true, true, false, false, false, false, false, false, false]
    );

    let mut final_event = None;
    while let Some(event) = sub.try_recv() {
        final_event = Some(event);
    }
    assert_eq!(
        final_event,
        Some(TaskEvent::Terminated {
            run_id: ctx.run_id().to_string(),
            processed: 3,
        })
    );
}

#[tokio::test]
async fn fatal_error_aborts_and_keeps_committed_work() {
    let store = Arc::new(MemoryStore::new());
    store.seed(
        "account",
        accounts(&["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8", "a9", "a10"]),
    );
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(Arc::clone(&events), Arc::clone(&metrics));

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().fatal_on(4),
        )
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(3));
    assert_eq!(report.outcome.error_count(), 1);
    assert_eq!(
        report.outcome.messages()[0].text,
        "a4: fatal: connector schema mismatch"
    );

    let saved: Vec<bool> = store
        .records_in("account")
        .iter()
        .map(|r| r.payload.get("processed").is_some())
        .collect();
    assert_eq!(saved[..3], [true, true, true]);
    assert!(saved[3..].iter().all(|s| !s));

    assert_eq!(metrics.counter("runs_failed_total").get(), 1);
    assert_eq!(metrics.counter("records_processed_total").get(), 3);
}

#[tokio::test]
async fn recoverable_failures_do_not_stop_the_run() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3", "a4", "a5", "a6"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, Arc::clone(&metrics));

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().failing(&["a2", "a5"]),
        )
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(4));
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_FAILED), Some(2));
    assert!(report.outcome.has_errors());

    let errors: Vec<&str> = report
        .outcome
        .messages()
        .iter()
        .filter(|m| m.kind == MessageKind::Error)
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(
        errors,
        vec![
            "a2: recoverable: identity has no manager",
            "a5: recoverable: identity has no manager",
        ]
    );
    assert_eq!(metrics.counter("records_failed_total").get(), 2);
}

#[tokio::test]
async fn skipped_records_are_counted_separately() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3", "a4"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics);

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().skipping(&["a2", "a3"]),
        )
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(2));
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_SKIPPED), Some(2));
    assert!(!report.outcome.has_errors());
}

#[tokio::test]
async fn commit_every_batches_records_per_commit() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3", "a4", "a5"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics);

    // Override the cadence through invocation arguments.
    let args = TaskArgs::new().with(ARG_COMMIT_EVERY, serde_json::json!(2));
    let ctx = ctx_for(&store, args);
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(5));

    // Two-record batches plus the final flush for the odd record.
    let session = store.last_session().unwrap();
    use SessionOp::{Commit, Save};
    assert_eq!(
        session.journal(),
        vec![Save, Save, Commit, Save, Save, Commit, Save, Commit]
    );
    assert_no_evict_with_staged(&session.journal());

    for record in store.records_in("account") {
        assert_eq!(record.payload["processed"], serde_json::json!(true));
    }
}

#[tokio::test]
async fn eviction_threshold_override_via_args() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics);

    let args = TaskArgs::new().with(ARG_EVICTION_THRESHOLD, serde_json::json!(1));
    let ctx = ctx_for(&store, args);
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    let session = store.last_session().unwrap();
    assert_eq!(session.evict_count(), 3);
    assert_no_evict_with_staged(&session.journal());
}

#[tokio::test]
async fn empty_source_completes_with_zero_counters() {
    let store = Arc::new(MemoryStore::new());
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics);

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(0));
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_SKIPPED), Some(0));
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_FAILED), Some(0));
    assert_eq!(store.commit_count(), 0);

    // The final snapshot still lands, marked completed.
    let snapshots = store.progress_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].1.completed);
}

#[tokio::test]
async fn failure_budget_aborts_after_limit() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3", "a4", "a5", "a6"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics);

    let args = TaskArgs::new().with(ARG_MAX_RECORD_FAILURES, serde_json::json!(2));
    let ctx = ctx_for(&store, args);
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().failing(&["a1", "a2", "a3", "a4", "a5", "a6"]),
        )
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_FAILED), Some(3));
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(0));

    // Three per-record messages plus the budget message.
    assert_eq!(report.outcome.error_count(), 4);
    assert_eq!(
        report.outcome.messages().last().unwrap().text,
        "record failure budget exceeded: 3 failures (budget 2)"
    );
}

#[tokio::test]
async fn progress_is_persisted_with_percent_and_cap() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3"]));
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics).with_config(BatchConfig {
        progress_interval: Duration::ZERO,
        ..BatchConfig::default()
    });

    let ctx = ctx_for(&store, TaskArgs::new());
    let long_activity = "Correlating entitlements for application ".repeat(10);
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().describing(long_activity),
        )
        .await;
    assert_eq!(report.status, RunStatus::Completed);

    // One snapshot per record plus the completion snapshot.
    let snapshots = store.progress_snapshots();
    assert_eq!(snapshots.len(), 4);

    let percents: Vec<Option<u8>> = snapshots.iter().map(|(_, s)| s.percent).collect();
    assert_eq!(percents, vec![Some(33), Some(66), Some(100), Some(100)]);

    for (_, snapshot) in &snapshots {
        assert!(snapshot.text.chars().count() <= 255);
    }
    assert!(snapshots[0].1.text.ends_with("..."));
    assert!(!snapshots[2].1.completed);
    assert!(snapshots[3].1.completed);
}

#[tokio::test]
async fn progress_persist_failure_does_not_fail_the_run() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3"]));
    store.fail_progress(true);
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, Arc::clone(&metrics)).with_config(BatchConfig {
        progress_interval: Duration::ZERO,
        ..BatchConfig::default()
    });

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(3));
    assert!(store.progress_snapshots().is_empty());
    // Three per-record attempts plus the completion snapshot.
    assert_eq!(metrics.counter("progress_persist_failures_total").get(), 4);
}

#[tokio::test]
async fn stream_failure_fails_the_run_before_the_loop() {
    let store = Arc::new(MemoryStore::new());
    store.fail_streams(true);
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, Arc::clone(&metrics));

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.outcome.error_count(), 1);
    assert_eq!(
        report.outcome.messages()[0].text,
        "opening record stream failed: query failed: injected stream failure"
    );
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(0));
    assert_eq!(metrics.counter("runs_failed_total").get(), 1);
}

#[tokio::test]
async fn commit_failure_fails_the_run() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3"]));
    store.fail_commits_after(1);
    let (events, metrics) = telemetry();
    let executor = BatchExecutor::new(events, metrics);

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(&ctx, &RecordQuery::category("account"), &TestOp::new())
        .await;

    assert_eq!(report.status, RunStatus::Failed);
    // The first record's commit stood; the second's failed.
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(1));
    assert_eq!(
        report.outcome.messages().last().unwrap().text,
        "commit failed: commit failed: injected commit failure"
    );
    assert_eq!(store.commit_count(), 1);
}

#[tokio::test]
async fn events_cover_the_full_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3"]));
    let (events, metrics) = telemetry();
    let mut sub = events.subscribe();
    let executor = BatchExecutor::new(Arc::clone(&events), Arc::clone(&metrics));

    let ctx = ctx_for(&store, TaskArgs::new());
    let report = executor
        .run(
            &ctx,
            &RecordQuery::category("account"),
            &TestOp::new().failing(&["a2"]),
        )
        .await;
    assert_eq!(report.status, RunStatus::Completed);

    let run_id = ctx.run_id().to_string();
    assert_eq!(
        sub.try_recv(),
        Some(TaskEvent::Started {
            run_id: run_id.clone(),
            task: "account_refresh".into(),
        })
    );
    assert_eq!(
        sub.try_recv(),
        Some(TaskEvent::RecordFailed {
            run_id: run_id.clone(),
            record: "a2".into(),
            error: "recoverable: identity has no manager".into(),
        })
    );
    match sub.try_recv() {
        Some(TaskEvent::Completed {
            run_id: id,
            processed,
            ..
        }) => {
            assert_eq!(id, run_id);
            assert_eq!(processed, 2);
        }
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(events.total_emitted(), 3);

    assert_eq!(metrics.counter("runs_started_total").get(), 1);
    assert_eq!(metrics.counter("runs_completed_total").get(), 1);
    assert_eq!(metrics.counter("records_processed_total").get(), 2);
    assert_eq!(metrics.counter("records_failed_total").get(), 1);
    assert_eq!(metrics.gauge("runs_active").get(), 0);
    assert_eq!(metrics.histogram("run_duration_seconds").count(), 1);
}

// ---------------------------------------------------------------------------
// Host tests
// ---------------------------------------------------------------------------

fn make_host(store: &Arc<MemoryStore>) -> (Arc<TaskHost>, Arc<EventBus>, Arc<MetricsRegistry>) {
    let (events, metrics) = telemetry();
    let host = TaskHost::new(
        Arc::clone(store) as Arc<dyn RecordStore>,
        Arc::clone(&events),
        Arc::clone(&metrics),
    );
    (Arc::new(host), events, metrics)
}

fn make_executor(events: &Arc<EventBus>, metrics: &Arc<MetricsRegistry>) -> Arc<BatchExecutor> {
    Arc::new(BatchExecutor::new(Arc::clone(events), Arc::clone(metrics)))
}

#[tokio::test]
async fn host_launches_by_normalized_key() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2"]));
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);

    let key = host
        .register(Arc::new(RefreshAdapter::new(executor, Arc::new(TestOp::new()))))
        .unwrap();
    assert_eq!(key.as_str(), "account_refresh");
    assert_eq!(host.tasks(), vec![key]);

    // Launch spelling differs from the registered spelling.
    let report = host.launch("Account Refresh", TaskArgs::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(2));

    // The report was persisted and the run is no longer active.
    assert_eq!(store.reports().len(), 1);
    assert_eq!(store.reports()[0].run_id, report.run_id);
    assert!(!host.is_active(report.run_id));
    assert!(host.active_runs().is_empty());
}

#[tokio::test]
async fn host_rejects_unknown_and_duplicate_tasks() {
    let store = Arc::new(MemoryStore::new());
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);

    let err = host.launch("score_refresh", TaskArgs::new()).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownTask { key } if key == "score_refresh"));

    host.register(Arc::new(RefreshAdapter::new(
        Arc::clone(&executor),
        Arc::new(TestOp::new()),
    )))
    .unwrap();
    let err = host
        .register(Arc::new(RefreshAdapter::new(executor, Arc::new(TestOp::new()))))
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateTask { key } if key == "account_refresh"));
}

#[tokio::test]
async fn config_error_becomes_failed_report() {
    let store = Arc::new(MemoryStore::new());
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);
    host.register(Arc::new(StrictAdapter::new(executor, Arc::new(TestOp::new()))))
        .unwrap();

    let report = host
        .launch("certification_activation", TaskArgs::new())
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.outcome.error_count(), 1);
    assert_eq!(
        report.outcome.messages()[0].text,
        "configuration error: missing required argument 'certification_group'"
    );
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(0));
    assert_eq!(metrics.counter("runs_failed_total").get(), 1);

    // Still persisted like any other finished run.
    assert_eq!(store.reports().len(), 1);
    assert_eq!(store.reports()[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn host_terminates_live_run() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2", "a3"]));
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);
    host.register(Arc::new(RefreshAdapter::new(
        executor,
        Arc::new(TestOp::new().waiting_for_cancel()),
    )))
    .unwrap();

    let handle = tokio::spawn({
        let host = Arc::clone(&host);
        async move { host.launch("account_refresh", TaskArgs::new()).await }
    });

    // Wait for the run to appear, then ask it to stop.
    let run = loop {
        if let Some(run) = host.active_runs().into_iter().next() {
            break run;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };
    assert_eq!(run.task.as_str(), "account_refresh");
    assert!(host.terminate(run.run_id));

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Terminated);
    assert!(report.was_terminated());
    // The record in flight when the request arrived still finished.
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(1));
    assert!(!host.is_active(run.run_id));
}

#[tokio::test]
async fn host_declines_termination_for_pinned_tasks() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2"]));
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);
    let gate = Arc::new(Semaphore::new(0));
    host.register(Arc::new(PinnedAdapter::new(
        executor,
        Arc::new(TestOp::new().gated(Arc::clone(&gate))),
    )))
    .unwrap();

    let handle = tokio::spawn({
        let host = Arc::clone(&host);
        async move { host.launch("retention_sweep", TaskArgs::new()).await }
    });

    let run = loop {
        if let Some(run) = host.active_runs().into_iter().next() {
            break run;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    // Declined: the run keeps going once the gate opens.
    assert!(!host.terminate(run.run_id));
    gate.add_permits(8);

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert!(!report.was_terminated());
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(2));
}

#[tokio::test]
async fn host_terminate_of_finished_run_is_declined() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1"]));
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);
    host.register(Arc::new(RefreshAdapter::new(executor, Arc::new(TestOp::new()))))
        .unwrap();

    let report = host.launch("account_refresh", TaskArgs::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert!(!host.terminate(report.run_id));
}

#[tokio::test]
async fn report_persist_failure_does_not_change_the_outcome() {
    let store = Arc::new(MemoryStore::new());
    store.seed("account", accounts(&["a1", "a2"]));
    store.fail_reports(true);
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);
    host.register(Arc::new(RefreshAdapter::new(executor, Arc::new(TestOp::new()))))
        .unwrap();

    let report = host.launch("account_refresh", TaskArgs::new()).await.unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(2));
    assert!(store.reports().is_empty());
}

#[tokio::test]
async fn strict_adapter_filters_by_constraint() {
    let store = Arc::new(MemoryStore::new());
    store.seed(
        "certification",
        vec![
            Record::new("cert-1", serde_json::json!({ "group": "q3-managers" })),
            Record::new("cert-2", serde_json::json!({ "group": "q3-managers" })),
            Record::new("cert-3", serde_json::json!({ "group": "q4-contractors" })),
        ],
    );
    let (host, events, metrics) = make_host(&store);
    let executor = make_executor(&events, &metrics);
    host.register(Arc::new(StrictAdapter::new(executor, Arc::new(TestOp::new()))))
        .unwrap();

    let args = TaskArgs::new().with("certification_group", serde_json::json!("q3-managers"));
    let report = host.launch("certification_activation", args).await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.outcome.attribute_u64(ATTR_RECORDS_PROCESSED), Some(2));
}
