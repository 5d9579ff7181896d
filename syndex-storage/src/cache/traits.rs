//! Cache backend trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use syndex_core::{CacheError, CollectionKey, Timestamp};

use super::feed::{CachedAggregateFeed, FeedId};

/// One (feed, term) row: the maximum write-timestamp ever observed for
/// that term across the feed's joined collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTimestampRow {
    pub feed_id: FeedId,
    pub term: String,
    pub max_timestamp: Timestamp,
}

/// Storage primitives for the aggregate-feed timestamp cache.
///
/// Rows are never owned by a single writer. The two mutating
/// primitives are shaped for the race-tolerant update protocol:
/// `update_max_timestamps` is a conditional batch whose per-pair
/// affected flag doubles as the "candidate new term" diff, and
/// `insert_row` keeps the maximum on a duplicate-key race instead of
/// failing.
#[async_trait]
pub trait FeedCacheBackend: Send + Sync {
    /// Register a feed specification. Registering an already-registered
    /// feed is a no-op; registering an evicted feed fails (eviction is
    /// terminal).
    async fn register_feed(&self, feed: CachedAggregateFeed) -> Result<(), CacheError>;

    /// Look up a registered feed by id.
    async fn feed(&self, feed_id: &FeedId) -> Result<Option<CachedAggregateFeed>, CacheError>;

    /// All registered feeds whose join includes the collection.
    async fn feeds_joining(
        &self,
        collection: &CollectionKey,
    ) -> Result<Vec<CachedAggregateFeed>, CacheError>;

    /// Evict a feed and drop its rows. Terminal.
    async fn evict_feed(&self, feed_id: &FeedId) -> Result<(), CacheError>;

    /// Batch conditional update: for each pair, raise an *existing*
    /// row's max timestamp to `max(existing, ts)`. The returned flags
    /// report whether a row existed for the pair (an update that finds
    /// a row but leaves a larger timestamp in place still counts as
    /// affected). `false` means zero rows: a candidate new term.
    async fn update_max_timestamps(
        &self,
        pairs: &[(FeedId, String)],
        ts: Timestamp,
    ) -> Result<Vec<bool>, CacheError>;

    /// Point read of one row's timestamp; the re-verify step of the
    /// insert protocol.
    async fn timestamp(&self, feed_id: &FeedId, term: &str) -> Result<Option<Timestamp>, CacheError>;

    /// Insert a row. If a concurrent writer inserted the same pair
    /// first, the larger timestamp wins and no error is raised.
    async fn insert_row(
        &self,
        feed_id: &FeedId,
        term: &str,
        ts: Timestamp,
    ) -> Result<(), CacheError>;

    /// All rows of one feed.
    async fn rows_for_feed(&self, feed_id: &FeedId) -> Result<Vec<FeedTimestampRow>, CacheError>;
}
