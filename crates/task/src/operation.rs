//! The per-record operation a batch run applies.

use async_trait::async_trait;

use crate::context::TaskContext;
use crate::error::RecordError;
use crate::record::Record;
use crate::store::StoreSession;

/// What the operation did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordDisposition {
    /// The record was processed and its mutations staged in the session.
    Processed,
    /// The record was examined and deliberately left alone.
    ///
    /// Skips are counted separately from successes but advance the commit
    /// and eviction cadence like any other cleanly handled record.
    Skipped,
}

/// The business operation applied to each record of a batch run.
///
/// Implementations stage their mutations through the session and must leave
/// the unit of work clean when returning a recoverable error — the executor
/// commits whatever is staged at the next cadence boundary.
#[async_trait]
pub trait RecordOperation: Send + Sync {
    /// Process one record.
    async fn process(
        &self,
        record: &Record,
        session: &dyn StoreSession,
        ctx: &TaskContext,
    ) -> Result<RecordDisposition, RecordError>;

    /// Short human-readable text for progress reporting.
    ///
    /// The executor appends position counters, so this should name the
    /// activity and the record only, e.g. `"Scanning application AD"`.
    fn describe(&self, record: &Record) -> String {
        format!("Processing {}", record.name)
    }
}
