//! Streaming record sources.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::Record;

/// A lazily-evaluated, forward-only sequence of records.
///
/// A source is consumed exactly once and never materializes the full result
/// set; the executor holds at most one record at a time. Implementations
/// wrap whatever cursor or paging mechanism the underlying store provides.
#[async_trait]
pub trait RecordSource: Send {
    /// Draw the next record, or `None` when the source is exhausted.
    async fn next(&mut self) -> Result<Option<Record>, StoreError>;

    /// Estimated total number of records, when the store can provide one.
    ///
    /// Used only for progress percentages; `None` disables them.
    fn size_hint(&self) -> Option<u64> {
        None
    }
}

/// A source backed by an in-memory vector.
///
/// The workhorse for tests and small in-memory stores; always knows its
/// total size.
pub struct VecSource {
    records: std::vec::IntoIter<Record>,
    total: u64,
}

impl VecSource {
    /// Create a source over the given records, preserving their order.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        let total = records.len() as u64;
        Self {
            records: records.into_iter(),
            total,
        }
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn next(&mut self) -> Result<Option<Record>, StoreError> {
        Ok(self.records.next())
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}
