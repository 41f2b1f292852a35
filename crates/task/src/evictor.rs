//! Periodic session cache eviction.
//!
//! Streaming over a large record set through a caching session grows the
//! identity cache without bound. The evictor counts records as the run
//! covers them and clears the session cache every time the configured
//! threshold is reached, keeping memory flat regardless of batch size.

use std::sync::Arc;

use crate::store::StoreSession;

/// Default number of records between cache evictions.
pub const DEFAULT_EVICTION_THRESHOLD: u32 = 20;

/// Counts covered records and evicts the session cache at a threshold.
///
/// Call [`increment`](Self::increment) once per record after its unit of
/// work has been committed; evicting mid-transaction would drop staged
/// writes. The counter resets on every eviction, so evictions land at
/// exact multiples of the threshold.
pub struct CacheEvictor {
    session: Arc<dyn StoreSession>,
    threshold: u32,
    count: u32,
    evictions: u64,
}

impl CacheEvictor {
    /// Create an evictor with the default threshold.
    #[must_use]
    pub fn new(session: Arc<dyn StoreSession>) -> Self {
        Self {
            session,
            threshold: DEFAULT_EVICTION_THRESHOLD,
            count: 0,
            evictions: 0,
        }
    }

    /// Set the eviction threshold (minimum 1).
    #[must_use]
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    /// Count one covered record, evicting the cache when the threshold is
    /// reached.
    pub fn increment(&mut self) {
        self.count += 1;
        if self.count >= self.threshold {
            tracing::debug!(
                threshold = self.threshold,
                cached = self.session.cached(),
                "evicting session cache"
            );
            self.session.evict();
            self.count = 0;
            self.evictions += 1;
        }
    }

    /// Records counted since the last eviction.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Total evictions performed so far.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// The configured threshold.
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl std::fmt::Debug for CacheEvictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEvictor")
            .field("threshold", &self.threshold)
            .field("count", &self.count)
            .field("evictions", &self.evictions)
            .finish_non_exhaustive()
    }
}
