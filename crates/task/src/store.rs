//! Record store and session boundaries.
//!
//! These traits are the only surface through which the batch core touches
//! persistence. The store hands out streaming sources and sessions; the
//! session owns a unit of work and the identity cache that grows with it.

use std::sync::Arc;

use async_trait::async_trait;
use warden_core::RunId;

use crate::error::StoreError;
use crate::progress::ProgressSnapshot;
use crate::record::{Record, RecordQuery};
use crate::report::TaskReport;
use crate::source::RecordSource;

/// The persistence boundary a task run draws from and reports to.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Open a forward-only source over the records matching `query`.
    async fn stream(&self, query: &RecordQuery) -> Result<Box<dyn RecordSource>, StoreError>;

    /// Open a session for a new unit of work.
    async fn session(&self) -> Result<Arc<dyn StoreSession>, StoreError>;

    /// Persist a progress snapshot in its own transaction.
    ///
    /// Independent of any open session: progress must become visible to
    /// operator tooling even while the run's current unit of work is
    /// uncommitted.
    async fn persist_progress(
        &self,
        run_id: RunId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError>;

    /// Durably store the final report of a finished run.
    async fn persist_report(&self, report: &TaskReport) -> Result<(), StoreError>;
}

/// One unit of work against the store.
///
/// Mutations accumulate in the session (and its identity cache) until
/// [`commit`](StoreSession::commit) flushes them atomically. The cache is
/// released explicitly via [`evict`](StoreSession::evict) — always after a
/// commit, never before, so no uncommitted mutation is ever dropped.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Stage a record write into the current unit of work.
    fn save(&self, record: Record) -> Result<(), StoreError>;

    /// Atomically flush the current unit of work.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Release the identity cache accumulated since the last eviction.
    ///
    /// In-process and infallible; the next access to an evicted entity
    /// re-reads it from the store.
    fn evict(&self);

    /// Number of entities currently held in the identity cache.
    fn cached(&self) -> usize;
}
