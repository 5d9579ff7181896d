//! Aggregate-feed cache maintenance.
//!
//! The cache answers "has anything in this join changed since T"
//! without scanning every joined collection. Rows are multi-writer:
//! one write's update sequence issues at most three storage round-trips
//! (batch conditional update, re-verify read, insert) and holds no
//! in-process lock across them. Correctness comes from the re-verify
//! step: a pair whose conditional update affected zero rows is only a
//! *candidate* new term, because a concurrent writer may have inserted
//! it between the update and the check.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use syndex_core::{
    CacheError, CategoryTerm, CollectionKey, LockName, Timestamp, LOCK_CACHE_BOOTSTRAP,
};
use syndex_storage::{CachedAggregateFeed, FeedCacheBackend, FeedId, LockService};

/// Drives the race-tolerant update protocol over a cache backend.
pub struct AggregateFeedCacheService {
    backend: Arc<dyn FeedCacheBackend>,
    locks: Arc<dyn LockService>,
    lock_timeout: Duration,
}

impl AggregateFeedCacheService {
    pub fn new(backend: Arc<dyn FeedCacheBackend>, locks: Arc<dyn LockService>) -> Self {
        Self {
            backend,
            locks,
            lock_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Register one feed specification.
    pub async fn register(&self, feed: CachedAggregateFeed) -> Result<(), CacheError> {
        self.backend.register_feed(feed).await
    }

    /// Create the feed on first sight. Distinct specifications are
    /// created the first time they are queried; an evicted feed stays
    /// evicted and is left alone.
    pub async fn ensure_registered(&self, feed: &CachedAggregateFeed) -> Result<(), CacheError> {
        match self.backend.register_feed(feed.clone()).await {
            Ok(()) | Err(CacheError::FeedEvicted { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Evict a feed. Terminal; its rows are dropped.
    pub async fn evict(&self, feed_id: &FeedId) -> Result<(), CacheError> {
        self.backend.evict_feed(feed_id).await
    }

    /// Register a batch of feed specifications under the bootstrap
    /// advisory lock. Lock acquisition failure is fatal for the whole
    /// bootstrap; no retry happens here.
    pub async fn bootstrap(&self, feeds: Vec<CachedAggregateFeed>) -> Result<(), CacheError> {
        let name = LockName::from(LOCK_CACHE_BOOTSTRAP);
        let _guard = self.locks.acquire(&name, self.lock_timeout)?;
        for feed in feeds {
            self.backend.register_feed(feed).await?;
        }
        Ok(())
    }

    /// Propagate one entry write into every registered feed whose join
    /// includes the collection and whose scheme matches one of the
    /// entry's categories.
    ///
    /// Phase 1: batch monotonic-max update of existing rows. Phase 2:
    /// pairs the update did not find are re-verified (a concurrent
    /// writer may have just inserted them); rows found on re-verify get
    /// the monotonic-max update instead. Phase 3: truly-absent pairs
    /// pass the locale filter and are inserted with the write's
    /// timestamp.
    pub async fn on_entry_write(
        &self,
        collection: &CollectionKey,
        categories: &BTreeSet<CategoryTerm>,
        entry_locale: Option<&str>,
        ts: Timestamp,
    ) -> Result<(), CacheError> {
        let feeds = self.backend.feeds_joining(collection).await?;
        if feeds.is_empty() {
            return Ok(());
        }

        let mut pairs: Vec<(FeedId, String)> = Vec::new();
        let mut pair_feeds: Vec<&CachedAggregateFeed> = Vec::new();
        for feed in &feeds {
            for category in categories {
                if category.scheme == feed.scheme {
                    pairs.push((feed.feed_id.clone(), category.term.clone()));
                    pair_feeds.push(feed);
                }
            }
        }
        if pairs.is_empty() {
            return Ok(());
        }

        let affected = self.backend.update_max_timestamps(&pairs, ts).await?;
        for (i, hit) in affected.into_iter().enumerate() {
            if hit {
                continue;
            }
            let (feed_id, term) = &pairs[i];
            if self.backend.timestamp(feed_id, term).await?.is_some() {
                // Lost the insert race; make sure our timestamp still
                // applies if it is the larger one.
                self.backend
                    .update_max_timestamps(std::slice::from_ref(&pairs[i]), ts)
                    .await?;
                continue;
            }
            if pair_feeds[i].locale_compatible(entry_locale) {
                self.backend.insert_row(feed_id, term, ts).await?;
            }
        }
        Ok(())
    }

    /// The subset of `feed_ids` whose cached terms show no change since
    /// `ts`: feeds whose highest cached term timestamp equals `ts`.
    /// Feeds with no rows (or unregistered ones) are never matched.
    pub async fn query_matching_timestamp(
        &self,
        feed_ids: &[FeedId],
        ts: Timestamp,
    ) -> Result<Vec<FeedId>, CacheError> {
        let mut matching = Vec::new();
        for feed_id in feed_ids {
            let rows = self.backend.rows_for_feed(feed_id).await?;
            let high_water = rows.iter().map(|r| r.max_timestamp).max();
            if high_water == Some(ts) {
                matching.push(feed_id.clone());
            }
        }
        Ok(matching)
    }
}
