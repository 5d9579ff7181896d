//! The entry write path and feed reads over it.
//!
//! A write touches two halves: the durable entry store and the
//! collection's ordered/term indices. From the caller's point of view
//! they are applied together or not at all: if the index half fails
//! after the store half succeeded, the store half is rolled back and
//! the write is reported as failed. Aggregate-cache updates happen
//! after the acknowledged write and are never allowed to fail it;
//! staleness is preferable to blocking writers.

use std::collections::BTreeSet;
use std::sync::Arc;

use syndex_core::{
    CategoryQuery, CategoryTerm, CollectionKey, ContentDigest, EntryId, EntryRecord,
    FeedQueryParams, IndexError, RevisionCheck, SyndexError, SyndexResult, WorkspaceConfig,
};
use syndex_storage::{CachedAggregateFeed, EntryStore, IndexRegistry};

use crate::cache_service::AggregateFeedCacheService;
use crate::pager::{FeedPage, FeedPager};

/// Mutation payload for an entry update.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    /// Replacement category set (full replacement, not a merge).
    pub categories: Option<BTreeSet<CategoryTerm>>,
    /// New content digest.
    pub content_digest: Option<ContentDigest>,
    /// New locale.
    pub locale: Option<String>,
}

/// Feed store facade: entry writes under optimistic concurrency plus
/// paginated feed reads.
pub struct FeedService {
    store: Arc<dyn EntryStore>,
    registry: Arc<dyn IndexRegistry>,
    cache: Option<Arc<AggregateFeedCacheService>>,
    pager: FeedPager,
    config: WorkspaceConfig,
}

impl FeedService {
    pub fn new(
        store: Arc<dyn EntryStore>,
        registry: Arc<dyn IndexRegistry>,
        config: WorkspaceConfig,
    ) -> Self {
        Self {
            store,
            registry,
            cache: None,
            pager: FeedPager::new(config.clone()),
            config,
        }
    }

    /// Attach an aggregate-feed cache to keep current on writes.
    pub fn with_cache(mut self, cache: Arc<AggregateFeedCacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    // === Writes ===

    /// Publish a new entry: assign its sequence, index it and persist
    /// it. The returned record carries the assigned sequence.
    pub async fn publish(&self, record: EntryRecord) -> SyndexResult<EntryRecord> {
        let index = self.registry.index_for(&record.collection).map_err(SyndexError::from)?;
        let sequence = index.append(record.clone()).map_err(SyndexError::from)?;

        let mut stored = record;
        stored.sequence = sequence;
        if let Err(err) = self.store.put_new(&stored) {
            // Roll back the index half; the sequence stays consumed.
            index.remove(sequence).map_err(SyndexError::from)?;
            return Err(err.into());
        }

        self.notify_cache(&stored).await;
        Ok(stored)
    }

    /// Update an entry under the revision check, retagging its term
    /// memberships atomically.
    pub async fn update(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
        expected: RevisionCheck,
        update: EntryUpdate,
    ) -> SyndexResult<EntryRecord> {
        let index = self
            .registry
            .existing(collection)
            .ok_or_else(|| IndexError::CollectionNotFound {
                collection: collection.clone(),
            })?;
        let current = self
            .store
            .get(collection, entry_id)
            .map_err(SyndexError::from)?
            .ok_or_else(|| {
                SyndexError::from(syndex_core::WriteError::EntryNotFound {
                    collection: collection.clone(),
                    entry_id,
                })
            })?;

        let mut candidate = current.clone();
        if let Some(categories) = update.categories {
            candidate.categories = categories;
        }
        if let Some(digest) = update.content_digest {
            candidate.content_digest = digest;
        }
        if let Some(locale) = update.locale {
            candidate.locale = Some(locale);
        }
        candidate.updated_at = chrono::Utc::now();

        let stored = self.store.compare_and_put(&candidate, expected)?;
        if let Err(err) = index.update_record(stored.clone()) {
            // Index half failed after the store half: restore the old
            // content under the revision this write just committed. A
            // conflict here means another writer already moved past the
            // committed revision; that write must not be clobbered, so
            // the conflict surfaces instead.
            self.store
                .compare_and_put(&current, RevisionCheck::Exact(stored.revision))?;
            return Err(err.into());
        }

        self.notify_cache(&stored).await;
        Ok(stored)
    }

    /// Mark an entry deleted under the revision check. The tombstone
    /// stays on the sequence axis and keeps its term memberships until
    /// obliterated.
    pub async fn delete(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
        expected: RevisionCheck,
    ) -> SyndexResult<EntryRecord> {
        let index = self
            .registry
            .existing(collection)
            .ok_or_else(|| IndexError::CollectionNotFound {
                collection: collection.clone(),
            })?;
        let current = self
            .store
            .get(collection, entry_id)
            .map_err(SyndexError::from)?;

        let stored = self.store.delete(collection, entry_id, expected)?;
        if let Err(err) = index.update_record(stored.clone()) {
            // Same revision-checked restore as the update path.
            if let Some(current) = current {
                self.store
                    .compare_and_put(&current, RevisionCheck::Exact(stored.revision))?;
            }
            return Err(err.into());
        }

        self.notify_cache(&stored).await;
        Ok(stored)
    }

    /// Free an entry's identity. Its sequence number is permanently
    /// consumed and its term memberships are purged.
    pub fn obliterate(&self, collection: &CollectionKey, entry_id: EntryId) -> SyndexResult<()> {
        let index = self
            .registry
            .existing(collection)
            .ok_or_else(|| IndexError::CollectionNotFound {
                collection: collection.clone(),
            })?;
        let gone = self.store.obliterate(collection, entry_id)?;
        index.remove(gone.sequence).map_err(SyndexError::from)?;
        Ok(())
    }

    // === Reads ===

    /// Get an entry by identity.
    pub fn get(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
    ) -> SyndexResult<Option<EntryRecord>> {
        Ok(self.store.get(collection, entry_id)?)
    }

    /// One page of a collection feed, optionally filtered.
    pub fn read_page(
        &self,
        collection: &CollectionKey,
        query: Option<&CategoryQuery>,
        params: &FeedQueryParams,
    ) -> SyndexResult<FeedPage> {
        let index = self
            .registry
            .existing(collection)
            .ok_or_else(|| IndexError::CollectionNotFound {
                collection: collection.clone(),
            })?;
        self.pager.page(index.as_ref(), query, params)
    }

    /// Read an aggregate feed: entries from every joined collection
    /// carrying the feed's scheme, ordered on the update-timestamp
    /// axis. When the cache confirms nothing in the join changed past
    /// the reader's floor, the joined scan is short-circuited with
    /// [`SyndexError::NotModified`].
    pub async fn read_aggregate(
        &self,
        feed: &CachedAggregateFeed,
        params: &FeedQueryParams,
    ) -> SyndexResult<Vec<EntryRecord>> {
        if let Some(cache) = &self.cache {
            // A distinct join specification is created the first time it
            // is queried; subsequent joined writes keep its rows current.
            cache.ensure_registered(feed).await?;
            if let Some(min) = params.updated_min {
                let unchanged = cache
                    .query_matching_timestamp(&[feed.feed_id.clone()], min)
                    .await?;
                if unchanged.contains(&feed.feed_id) && !params.scroll_on_unmodified {
                    return Err(SyndexError::NotModified);
                }
            }
        }

        let mut entries = Vec::new();
        for collection in &feed.joined_collections {
            let Some(index) = self.registry.existing(collection) else {
                continue;
            };
            for record in index.tail_from(0).map_err(SyndexError::from)? {
                if !record.carries_scheme(&feed.scheme) {
                    continue;
                }
                if !feed.locale_compatible(record.locale.as_deref()) {
                    continue;
                }
                if params.updated_min.is_some_and(|min| record.updated_at < min) {
                    continue;
                }
                entries.push(record);
            }
        }
        entries.sort_by(|a, b| {
            (a.updated_at, &a.collection, a.sequence).cmp(&(b.updated_at, &b.collection, b.sequence))
        });
        entries.truncate(params.effective_page_size(&self.config));
        Ok(entries)
    }

    async fn notify_cache(&self, record: &EntryRecord) {
        let Some(cache) = &self.cache else {
            return;
        };
        if let Err(err) = cache
            .on_entry_write(
                &record.collection,
                &record.categories,
                record.locale.as_deref(),
                record.updated_at,
            )
            .await
        {
            tracing::warn!(
                collection = %record.collection,
                error = %err,
                "aggregate cache update failed; cached feed timestamps may be stale"
            );
        }
    }
}
