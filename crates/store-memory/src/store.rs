//! In-memory record store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use warden_core::{RecordId, RunId};
use warden_task::{
    ProgressSnapshot, Record, RecordQuery, RecordSource, RecordStore, StoreError, StoreSession,
    TaskReport, VecSource,
};

use crate::session::MemorySession;

/// State shared between the store handle and its sessions.
pub(crate) struct StoreInner {
    /// All records by identity.
    pub(crate) records: DashMap<RecordId, Record>,
    /// Category index, preserving seed order.
    pub(crate) categories: DashMap<String, Vec<RecordId>>,
    /// Successful commits across all sessions.
    pub(crate) commits: AtomicU64,
    /// Commit attempts across all sessions, counted before the failure gate.
    pub(crate) commit_attempts: AtomicU64,
    /// Commit attempts beyond this number fail.
    pub(crate) fail_commits_after: AtomicU64,
}

/// An in-memory [`RecordStore`].
///
/// Backs tests and demos. Streaming order follows seed order within a
/// category. Query constraints match on payload fields: a scalar
/// constraint requires equality, an array constraint requires the payload
/// value to be one of its elements.
///
/// Fault injection knobs ([`fail_commits_after`](Self::fail_commits_after)
/// and friends) exercise the failure paths a real backend would produce.
pub struct MemoryStore {
    inner: Arc<StoreInner>,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
    progress: Mutex<Vec<(RunId, ProgressSnapshot)>>,
    reports: Mutex<Vec<TaskReport>>,
    fail_streams: AtomicBool,
    fail_progress: AtomicBool,
    fail_reports: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                records: DashMap::new(),
                categories: DashMap::new(),
                commits: AtomicU64::new(0),
                commit_attempts: AtomicU64::new(0),
                fail_commits_after: AtomicU64::new(u64::MAX),
            }),
            sessions: Mutex::new(Vec::new()),
            progress: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
            fail_streams: AtomicBool::new(false),
            fail_progress: AtomicBool::new(false),
            fail_reports: AtomicBool::new(false),
        }
    }

    /// Seed records into a category, appending in order.
    pub fn seed(&self, category: impl Into<String>, records: Vec<Record>) {
        let mut index = self.inner.categories.entry(category.into()).or_default();
        for record in records {
            index.push(record.id);
            self.inner.records.insert(record.id, record);
        }
    }

    /// Look up one record by identity.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<Record> {
        self.inner.records.get(&id).map(|r| r.clone())
    }

    /// All records in a category, in seed order.
    #[must_use]
    pub fn records_in(&self, category: &str) -> Vec<Record> {
        let Some(index) = self.inner.categories.get(category) else {
            return Vec::new();
        };
        index
            .iter()
            .filter_map(|id| self.inner.records.get(id).map(|r| r.clone()))
            .collect()
    }

    /// Total records held, across categories and uncategorised saves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Successful commits across all sessions.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Every session handed out so far, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<MemorySession>> {
        self.sessions.lock().clone()
    }

    /// The most recently opened session.
    #[must_use]
    pub fn last_session(&self) -> Option<Arc<MemorySession>> {
        self.sessions.lock().last().cloned()
    }

    /// Persisted progress snapshots, oldest first.
    #[must_use]
    pub fn progress_snapshots(&self) -> Vec<(RunId, ProgressSnapshot)> {
        self.progress.lock().clone()
    }

    /// Persisted task reports, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<TaskReport> {
        self.reports.lock().clone()
    }

    /// Allow the first `n` commit attempts to succeed and fail the rest.
    pub fn fail_commits_after(&self, n: u64) {
        self.inner.fail_commits_after.store(n, Ordering::SeqCst);
    }

    /// Make [`RecordStore::stream`] fail.
    pub fn fail_streams(&self, fail: bool) {
        self.fail_streams.store(fail, Ordering::SeqCst);
    }

    /// Make progress persistence fail.
    pub fn fail_progress(&self, fail: bool) {
        self.fail_progress.store(fail, Ordering::SeqCst);
    }

    /// Make report persistence fail.
    pub fn fail_reports(&self, fail: bool) {
        self.fail_reports.store(fail, Ordering::SeqCst);
    }

    fn matches(record: &Record, constraints: &serde_json::Map<String, Value>) -> bool {
        constraints.iter().all(|(key, expected)| {
            let actual = record.payload.get(key);
            match expected {
                Value::Array(allowed) => actual.is_some_and(|a| allowed.contains(a)),
                other => actual == Some(other),
            }
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn stream(&self, query: &RecordQuery) -> Result<Box<dyn RecordSource>, StoreError> {
        if self.fail_streams.load(Ordering::SeqCst) {
            return Err(StoreError::query("injected stream failure"));
        }

        let selected: Vec<Record> = self
            .records_in(&query.category)
            .into_iter()
            .filter(|record| Self::matches(record, &query.constraints))
            .collect();
        tracing::debug!(category = %query.category, matched = selected.len(), "streaming records");
        Ok(Box::new(VecSource::new(selected)))
    }

    async fn session(&self) -> Result<Arc<dyn StoreSession>, StoreError> {
        let session = Arc::new(MemorySession::new(Arc::clone(&self.inner)));
        self.sessions.lock().push(Arc::clone(&session));
        Ok(session)
    }

    async fn persist_progress(
        &self,
        run_id: RunId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError> {
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(StoreError::persist("injected progress failure"));
        }
        self.progress.lock().push((run_id, snapshot.clone()));
        Ok(())
    }

    async fn persist_report(&self, report: &TaskReport) -> Result<(), StoreError> {
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(StoreError::persist("injected report failure"));
        }
        self.reports.lock().push(report.clone());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.inner.records.len())
            .field("categories", &self.inner.categories.len())
            .field("commits", &self.inner.commits.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOp;
    use serde_json::json;

    fn account(name: &str, application: &str) -> Record {
        Record::new(name, json!({ "application": application }))
    }

    #[tokio::test]
    async fn stream_preserves_seed_order() {
        let store = MemoryStore::new();
        store.seed(
            "account",
            vec![
                account("alice", "AD"),
                account("bob", "AD"),
                account("carol", "LDAP"),
            ],
        );

        let mut source = store.stream(&RecordQuery::category("account")).await.unwrap();
        let mut names = Vec::new();
        while let Some(record) = source.next().await.unwrap() {
            names.push(record.name);
        }
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[tokio::test]
    async fn stream_of_unknown_category_is_empty() {
        let store = MemoryStore::new();
        let mut source = store.stream(&RecordQuery::category("missing")).await.unwrap();
        assert_eq!(source.size_hint(), Some(0));
        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scalar_constraint_requires_equality() {
        let store = MemoryStore::new();
        store.seed(
            "account",
            vec![account("alice", "AD"), account("carol", "LDAP")],
        );

        let query = RecordQuery::category("account").with_constraint("application", json!("AD"));
        let mut source = store.stream(&query).await.unwrap();
        let record = source.next().await.unwrap().unwrap();
        assert_eq!(record.name, "alice");
        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn array_constraint_matches_membership() {
        let store = MemoryStore::new();
        store.seed(
            "account",
            vec![
                account("alice", "AD"),
                account("bob", "SAP"),
                account("carol", "LDAP"),
            ],
        );

        let query =
            RecordQuery::category("account").with_constraint("application", json!(["AD", "LDAP"]));
        let mut source = store.stream(&query).await.unwrap();
        let mut names = Vec::new();
        while let Some(record) = source.next().await.unwrap() {
            names.push(record.name);
        }
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn commit_applies_staged_records() {
        let store = MemoryStore::new();
        let session = store.session().await.unwrap();

        let record = account("alice", "AD");
        let id = record.id;
        session.save(record).unwrap();
        assert!(store.get(id).is_none(), "save alone must not hit the store");

        session.commit().await.unwrap();
        assert_eq!(store.get(id).unwrap().name, "alice");
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn commit_upserts_existing_record() {
        let store = MemoryStore::new();
        let original = account("alice", "AD");
        let id = original.id;
        store.seed("account", vec![original.clone()]);

        let session = store.session().await.unwrap();
        let mut updated = original.clone();
        updated.payload = json!({ "application": "AD", "risk_score": 72 });
        session.save(updated).unwrap();
        session.commit().await.unwrap();

        let stored = store.get(id).unwrap();
        assert_eq!(stored.payload["risk_score"], 72);
        // The category index still finds it under its old slot.
        assert_eq!(store.records_in("account").len(), 1);
    }

    #[tokio::test]
    async fn evict_clears_cache_but_not_store() {
        let store = MemoryStore::new();
        let session = store.session().await.unwrap();

        let record = account("alice", "AD");
        let id = record.id;
        session.save(record).unwrap();
        session.commit().await.unwrap();
        assert_eq!(session.cached(), 1);

        session.evict();
        assert_eq!(session.cached(), 0);
        assert!(store.get(id).is_some());
    }

    #[tokio::test]
    async fn injected_commit_failure_fires_after_budget() {
        let store = MemoryStore::new();
        store.fail_commits_after(2);
        let session = store.session().await.unwrap();

        session.commit().await.unwrap();
        session.commit().await.unwrap();
        let err = session.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Commit(_)));
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn journal_orders_save_commit_evict() {
        let store = MemoryStore::new();
        let session = store.session().await.unwrap();
        let concrete = store.last_session().unwrap();

        session.save(account("alice", "AD")).unwrap();
        session.commit().await.unwrap();
        session.evict();

        assert_eq!(
            concrete.journal(),
            vec![SessionOp::Save, SessionOp::Commit, SessionOp::Evict]
        );
        assert_eq!(concrete.commit_count(), 1);
        assert_eq!(concrete.evict_count(), 1);
    }

    #[tokio::test]
    async fn progress_and_reports_are_recorded() {
        let store = MemoryStore::new();
        let run_id = RunId::v4();
        let snapshot = ProgressSnapshot {
            text: "working".into(),
            percent: Some(10),
            completed: false,
            updated_at: chrono::Utc::now(),
        };

        store.persist_progress(run_id, &snapshot).await.unwrap();
        let persisted = store.progress_snapshots();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].0, run_id);
        assert_eq!(persisted[0].1.text, "working");
    }

    #[tokio::test]
    async fn injected_progress_failure() {
        let store = MemoryStore::new();
        store.fail_progress(true);
        let snapshot = ProgressSnapshot {
            text: "working".into(),
            percent: None,
            completed: false,
            updated_at: chrono::Utc::now(),
        };
        let err = store.persist_progress(RunId::v4(), &snapshot).await.unwrap_err();
        assert!(matches!(err, StoreError::Persist(_)));
        assert!(store.progress_snapshots().is_empty());
    }
}
