//! Throttled, bounded progress reporting.
//!
//! A batch run can draw millions of records; writing a progress row per
//! record would swamp the store. The monitor keeps the current status in
//! memory and flushes it through a [`ProgressSink`] only when forced or when
//! the persist interval has elapsed, truncating status text to a fixed cap
//! so the persisted column never overflows.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_core::RunId;

use crate::error::StoreError;

/// Default maximum length of persisted status text, in characters.
pub const DEFAULT_STATUS_CAP: usize = 255;

/// Default minimum interval between persisted snapshots.
pub const DEFAULT_PERSIST_INTERVAL: Duration = Duration::from_secs(5);

/// Marker appended to truncated status text, counted inside the cap.
pub const TRUNCATION_MARKER: &str = "...";

/// One persisted view of a run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Bounded status text.
    pub text: String,
    /// Completion percentage, `None` when the total is unknown.
    pub percent: Option<u8>,
    /// Whether the run has finished reporting progress.
    pub completed: bool,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

/// Destination for persisted progress snapshots.
///
/// Implementations commit each snapshot as its own transaction so progress
/// is visible to operator tooling regardless of the run's open unit of work.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Persist one snapshot for the given run.
    async fn persist_progress(
        &self,
        run_id: RunId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError>;
}

/// Truncate status text to at most `cap` characters.
///
/// Text longer than the cap keeps its first `cap - 3` characters and gets
/// the [`TRUNCATION_MARKER`] appended, yielding exactly `cap` characters.
/// Operates on characters, never splitting a UTF-8 scalar. Idempotent:
/// truncating already-truncated text is a no-op.
#[must_use]
pub fn truncate_status(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_owned();
    }
    let keep = cap.saturating_sub(TRUNCATION_MARKER.len());
    if keep == 0 {
        return TRUNCATION_MARKER.chars().take(cap).collect();
    }
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Accumulates and throttles a run's progress state.
///
/// Owned exclusively by the worker driving the run; the persisted copy is
/// the only view anyone else sees. Persist failures are returned to the
/// caller and leave the throttle untouched, so the next update retries.
pub struct ProgressMonitor {
    run_id: RunId,
    sink: Arc<dyn ProgressSink>,
    cap: usize,
    interval: Duration,
    text: String,
    percent: Option<u8>,
    completed: bool,
    last_persist: Option<Instant>,
}

impl ProgressMonitor {
    /// Create a monitor with the default cap and persist interval.
    #[must_use]
    pub fn new(run_id: RunId, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            run_id,
            sink,
            cap: DEFAULT_STATUS_CAP,
            interval: DEFAULT_PERSIST_INTERVAL,
            text: String::new(),
            percent: None,
            completed: false,
            last_persist: None,
        }
    }

    /// Set the status text cap in characters (minimum 4).
    #[must_use]
    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(TRUNCATION_MARKER.len() + 1);
        self
    }

    /// Set the minimum interval between persisted snapshots.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Update the status text, leaving the percentage unchanged.
    ///
    /// Returns `Ok(true)` if a snapshot was persisted, `Ok(false)` if the
    /// update was buffered in memory only.
    pub async fn update(&mut self, text: impl Into<String>) -> Result<bool, StoreError> {
        self.apply(text.into(), None, false).await
    }

    /// Update the status text and completion percentage (clamped to 100).
    pub async fn update_with_percent(
        &mut self,
        text: impl Into<String>,
        percent: u8,
    ) -> Result<bool, StoreError> {
        self.apply(text.into(), Some(percent), false).await
    }

    /// Update and persist unconditionally, bypassing the throttle.
    pub async fn force_update(
        &mut self,
        text: impl Into<String>,
        percent: Option<u8>,
    ) -> Result<(), StoreError> {
        self.apply(text.into(), percent, true).await.map(|_| ())
    }

    /// Mark the run as finished reporting and persist the final snapshot.
    ///
    /// Idempotent; the flag never reverts.
    pub async fn complete(&mut self) -> Result<(), StoreError> {
        self.completed = true;
        self.persist().await
    }

    /// Current (possibly unpersisted) status text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Current completion percentage.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        self.percent
    }

    /// Whether [`complete`](Self::complete) has been called.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// A snapshot of the current in-memory state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            text: self.text.clone(),
            percent: self.percent,
            completed: self.completed,
            updated_at: Utc::now(),
        }
    }

    async fn apply(
        &mut self,
        text: String,
        percent: Option<u8>,
        force: bool,
    ) -> Result<bool, StoreError> {
        self.text = truncate_status(&text, self.cap);
        if let Some(p) = percent {
            self.percent = Some(p.min(100));
        }

        let due = match self.last_persist {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        };
        if force || due {
            self.persist().await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn persist(&mut self) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        self.sink.persist_progress(self.run_id, &snapshot).await?;
        tracing::trace!(run_id = %self.run_id, text = %snapshot.text, "persisted progress");
        self.last_persist = Some(Instant::now());
        Ok(())
    }
}

impl std::fmt::Debug for ProgressMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressMonitor")
            .field("run_id", &self.run_id)
            .field("cap", &self.cap)
            .field("interval", &self.interval)
            .field("text", &self.text)
            .field("percent", &self.percent)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
