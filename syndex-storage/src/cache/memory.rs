//! In-memory cache backend.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use syndex_core::{CacheError, CollectionKey, Timestamp};

use super::feed::{CachedAggregateFeed, FeedId};
use super::traits::{FeedCacheBackend, FeedTimestampRow};

#[derive(Default)]
struct CacheState {
    feeds: HashMap<FeedId, CachedAggregateFeed>,
    rows: HashMap<(FeedId, String), Timestamp>,
    evicted: HashSet<FeedId>,
}

/// In-memory [`FeedCacheBackend`] behind a `tokio::sync::RwLock`.
#[derive(Default)]
pub struct InMemoryCacheBackend {
    state: RwLock<CacheState>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedCacheBackend for InMemoryCacheBackend {
    async fn register_feed(&self, feed: CachedAggregateFeed) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        if state.evicted.contains(&feed.feed_id) {
            return Err(CacheError::FeedEvicted {
                feed_id: feed.feed_id.to_string(),
            });
        }
        state.feeds.entry(feed.feed_id.clone()).or_insert(feed);
        Ok(())
    }

    async fn feed(&self, feed_id: &FeedId) -> Result<Option<CachedAggregateFeed>, CacheError> {
        let state = self.state.read().await;
        Ok(state.feeds.get(feed_id).cloned())
    }

    async fn feeds_joining(
        &self,
        collection: &CollectionKey,
    ) -> Result<Vec<CachedAggregateFeed>, CacheError> {
        let state = self.state.read().await;
        Ok(state
            .feeds
            .values()
            .filter(|f| f.joins(collection))
            .cloned()
            .collect())
    }

    async fn evict_feed(&self, feed_id: &FeedId) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        if state.feeds.remove(feed_id).is_none() {
            return Err(CacheError::FeedNotRegistered {
                feed_id: feed_id.to_string(),
            });
        }
        state.rows.retain(|(id, _), _| id != feed_id);
        state.evicted.insert(feed_id.clone());
        Ok(())
    }

    async fn update_max_timestamps(
        &self,
        pairs: &[(FeedId, String)],
        ts: Timestamp,
    ) -> Result<Vec<bool>, CacheError> {
        let mut state = self.state.write().await;
        let mut affected = Vec::with_capacity(pairs.len());
        for (feed_id, term) in pairs {
            match state.rows.get_mut(&(feed_id.clone(), term.clone())) {
                Some(existing) => {
                    if ts > *existing {
                        *existing = ts;
                    }
                    affected.push(true);
                }
                None => affected.push(false),
            }
        }
        Ok(affected)
    }

    async fn timestamp(
        &self,
        feed_id: &FeedId,
        term: &str,
    ) -> Result<Option<Timestamp>, CacheError> {
        let state = self.state.read().await;
        Ok(state.rows.get(&(feed_id.clone(), term.to_string())).copied())
    }

    async fn insert_row(
        &self,
        feed_id: &FeedId,
        term: &str,
        ts: Timestamp,
    ) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        if !state.feeds.contains_key(feed_id) {
            return Err(CacheError::FeedNotRegistered {
                feed_id: feed_id.to_string(),
            });
        }
        state
            .rows
            .entry((feed_id.clone(), term.to_string()))
            .and_modify(|existing| {
                if ts > *existing {
                    *existing = ts;
                }
            })
            .or_insert(ts);
        Ok(())
    }

    async fn rows_for_feed(&self, feed_id: &FeedId) -> Result<Vec<FeedTimestampRow>, CacheError> {
        let state = self.state.read().await;
        let mut rows: Vec<FeedTimestampRow> = state
            .rows
            .iter()
            .filter(|((id, _), _)| id == feed_id)
            .map(|((id, term), ts)| FeedTimestampRow {
                feed_id: id.clone(),
                term: term.clone(),
                max_timestamp: *ts,
            })
            .collect();
        rows.sort_by(|a, b| a.term.cmp(&b.term));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn feed(collections: &[&str]) -> CachedAggregateFeed {
        CachedAggregateFeed::new(
            collections
                .iter()
                .map(|c| CollectionKey::new("ws", *c))
                .collect(),
            "urn:hue",
            None,
        )
    }

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn register_is_idempotent_eviction_terminal() {
        let backend = InMemoryCacheBackend::new();
        let f = feed(&["reds"]);

        backend.register_feed(f.clone()).await.unwrap();
        backend.register_feed(f.clone()).await.unwrap();
        assert!(backend.feed(&f.feed_id).await.unwrap().is_some());

        backend.evict_feed(&f.feed_id).await.unwrap();
        assert!(backend.feed(&f.feed_id).await.unwrap().is_none());
        assert!(matches!(
            backend.register_feed(f.clone()).await,
            Err(CacheError::FeedEvicted { .. })
        ));
    }

    #[tokio::test]
    async fn update_reports_affected_rows() {
        let backend = InMemoryCacheBackend::new();
        let f = feed(&["reds"]);
        backend.register_feed(f.clone()).await.unwrap();
        backend.insert_row(&f.feed_id, "blue", ts(100)).await.unwrap();

        let affected = backend
            .update_max_timestamps(
                &[
                    (f.feed_id.clone(), "blue".to_string()),
                    (f.feed_id.clone(), "green".to_string()),
                ],
                ts(150),
            )
            .await
            .unwrap();
        assert_eq!(affected, vec![true, false]);
        assert_eq!(backend.timestamp(&f.feed_id, "blue").await.unwrap(), Some(ts(150)));
        assert_eq!(backend.timestamp(&f.feed_id, "green").await.unwrap(), None);
    }

    #[tokio::test]
    async fn max_timestamp_never_decreases() {
        let backend = InMemoryCacheBackend::new();
        let f = feed(&["reds"]);
        backend.register_feed(f.clone()).await.unwrap();
        backend.insert_row(&f.feed_id, "blue", ts(100)).await.unwrap();

        let affected = backend
            .update_max_timestamps(&[(f.feed_id.clone(), "blue".to_string())], ts(90))
            .await
            .unwrap();
        // The row existed, so the update counts as affected even though
        // the larger timestamp stays.
        assert_eq!(affected, vec![true]);
        assert_eq!(backend.timestamp(&f.feed_id, "blue").await.unwrap(), Some(ts(100)));

        backend.insert_row(&f.feed_id, "blue", ts(80)).await.unwrap();
        assert_eq!(backend.timestamp(&f.feed_id, "blue").await.unwrap(), Some(ts(100)));
    }

    #[tokio::test]
    async fn feeds_joining_filters_by_collection() {
        let backend = InMemoryCacheBackend::new();
        let both = feed(&["reds", "purples"]);
        let reds_only = feed(&["reds"]);
        backend.register_feed(both.clone()).await.unwrap();
        backend.register_feed(reds_only.clone()).await.unwrap();

        let joining = backend
            .feeds_joining(&CollectionKey::new("ws", "purples"))
            .await
            .unwrap();
        assert_eq!(joining.len(), 1);
        assert_eq!(joining[0].feed_id, both.feed_id);
    }

    #[tokio::test]
    async fn eviction_drops_rows() {
        let backend = InMemoryCacheBackend::new();
        let f = feed(&["reds"]);
        backend.register_feed(f.clone()).await.unwrap();
        backend.insert_row(&f.feed_id, "blue", ts(1)).await.unwrap();

        backend.evict_feed(&f.feed_id).await.unwrap();
        assert!(backend.rows_for_feed(&f.feed_id).await.unwrap().is_empty());
    }
}
