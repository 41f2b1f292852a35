//! Caching session over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use warden_core::RecordId;
use warden_task::{Record, StoreError, StoreSession};

use crate::store::StoreInner;

/// One entry in a session's operation journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// A record was staged for write.
    Save,
    /// Staged writes were committed to the store.
    Commit,
    /// The identity cache was cleared.
    Evict,
}

/// A unit-of-work session with an identity cache.
///
/// Saved records are staged until [`commit`](StoreSession::commit) applies
/// them to the backing store in one batch. Every saved record is also
/// pinned in the identity cache until [`evict`](StoreSession::evict)
/// clears it. The journal records the order of operations, so tests can
/// assert that eviction never lands between a save and its commit.
pub struct MemorySession {
    inner: Arc<StoreInner>,
    cache: DashMap<RecordId, Record>,
    staged: Mutex<Vec<Record>>,
    journal: Mutex<Vec<SessionOp>>,
    commits: AtomicU64,
    evictions: AtomicU64,
}

impl MemorySession {
    pub(crate) fn new(inner: Arc<StoreInner>) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            staged: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
            commits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// The ordered journal of operations performed on this session.
    #[must_use]
    pub fn journal(&self) -> Vec<SessionOp> {
        self.journal.lock().clone()
    }

    /// Successful commits on this session.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Cache evictions on this session.
    #[must_use]
    pub fn evict_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Records staged but not yet committed.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.lock().len()
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    fn save(&self, record: Record) -> Result<(), StoreError> {
        self.cache.insert(record.id, record.clone());
        self.staged.lock().push(record);
        self.journal.lock().push(SessionOp::Save);
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        let attempt = self.inner.commit_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.inner.fail_commits_after.load(Ordering::SeqCst) {
            return Err(StoreError::commit("injected commit failure"));
        }

        let staged: Vec<Record> = std::mem::take(&mut *self.staged.lock());
        tracing::trace!(staged = staged.len(), "committing session");
        for record in staged {
            self.inner.records.insert(record.id, record);
        }

        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.journal.lock().push(SessionOp::Commit);
        Ok(())
    }

    fn evict(&self) {
        self.cache.clear();
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.journal.lock().push(SessionOp::Evict);
    }

    fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("cached", &self.cache.len())
            .field("staged", &self.staged.lock().len())
            .field("commits", &self.commits.load(Ordering::Relaxed))
            .field("evictions", &self.evictions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
