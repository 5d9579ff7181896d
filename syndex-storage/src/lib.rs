//! syndex Storage - Storage Traits and In-Memory Implementations
//!
//! Defines the storage abstraction layer for syndex: the durable entry
//! store, the per-collection ordered/term indices, the named advisory
//! lock service and the aggregate-feed cache backend. Backends are
//! selected at configuration time; the in-memory implementations here
//! are the reference backend and the test substrate.

pub mod cache;
pub mod lock;
pub mod memory;

pub use cache::{
    CachedAggregateFeed, FeedCacheBackend, FeedId, FeedTimestampRow, InMemoryCacheBackend,
};
pub use lock::{InProcessLockService, LockGuard, LockService};
pub use memory::{InMemoryCollectionIndex, InMemoryEntryStore, InMemoryIndexRegistry};

use std::sync::Arc;
use syndex_core::{
    CollectionKey, EntryId, EntryRecord, IndexError, RevisionCheck, Timestamp, WriteError,
};

// ============================================================================
// ENTRY STORE
// ============================================================================

/// Durable map from entry identity to its current metadata.
///
/// Mutations are compare-and-swap on the revision: a mutation succeeds
/// and increments the revision by exactly 1 iff the supplied revision
/// equals the stored one at the moment of the atomic update, or
/// unconditionally under [`RevisionCheck::Override`].
pub trait EntryStore: Send + Sync {
    /// Get an entry by identity.
    fn get(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
    ) -> Result<Option<EntryRecord>, IndexError>;

    /// Insert a new entry. Fails if the identity already exists.
    fn put_new(&self, record: &EntryRecord) -> Result<(), WriteError>;

    /// Replace the stored record under the revision check. On success
    /// the stored revision is `old + 1` and the stored record is
    /// returned. On mismatch nothing is mutated and
    /// [`WriteError::Conflict`] carries the current revision.
    fn compare_and_put(
        &self,
        record: &EntryRecord,
        expected: RevisionCheck,
    ) -> Result<EntryRecord, WriteError>;

    /// Mark an entry deleted under the revision check. The record stays
    /// addressable (tombstone); the sequence stays consumed.
    fn delete(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
        expected: RevisionCheck,
    ) -> Result<EntryRecord, WriteError>;

    /// Free the identity entirely. The sequence number it consumed is
    /// never reused.
    fn obliterate(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
    ) -> Result<EntryRecord, WriteError>;
}

// ============================================================================
// COLLECTION INDEX
// ============================================================================

/// Per-collection ordered entry index plus its category term indices.
///
/// The collection is the unit of mutual exclusion: sequence assignment
/// within one collection is linearizable, and operations never block
/// unrelated collections. Term membership invariant: a sequence number
/// appears in a term's set iff the entry currently carries that term
/// and has not been removed.
pub trait CollectionIndex: Send + Sync {
    /// Append a record: atomically assign the next sequence number,
    /// insert into the ordered index and add every category membership
    /// in the same batch. Returns the assigned sequence.
    fn append(&self, record: EntryRecord) -> Result<u64, IndexError>;

    /// All records with `sequence >= floor`, ascending. A snapshot;
    /// restartable by re-calling with a new floor. No acknowledged
    /// entry at or after the floor is ever skipped.
    fn tail_from(&self, floor: u64) -> Result<Vec<EntryRecord>, IndexError>;

    /// The record at an exact sequence, if present.
    fn record_at(&self, sequence: u64) -> Result<Option<EntryRecord>, IndexError>;

    /// Replace the record at its sequence and atomically re-diff term
    /// memberships (old-only terms removed, new-only terms added).
    /// Readers never observe a partially-retagged entry.
    fn update_record(&self, record: EntryRecord) -> Result<(), IndexError>;

    /// Physically remove the record and purge all its term
    /// memberships. The sequence number stays consumed: the monotonic
    /// counter never rewinds and gaps are never reused.
    fn remove(&self, sequence: u64) -> Result<(), IndexError>;

    /// Ascending sequence numbers of entries carrying the exact
    /// (scheme, term). Absent term is an empty result, not an error.
    fn term_tail_from(
        &self,
        scheme: &str,
        term: &str,
        floor: u64,
    ) -> Result<Vec<u64>, IndexError>;

    /// Ascending, deduplicated sequence numbers of entries carrying
    /// the term under any scheme.
    fn term_tail_from_any(&self, term: &str, floor: u64) -> Result<Vec<u64>, IndexError>;

    /// The last assigned sequence number (0 when nothing was ever
    /// appended). Removals do not lower it.
    fn high_water_mark(&self) -> Result<u64, IndexError>;

    /// Smallest sequence whose record was updated at or after the
    /// instant, for resolving a timestamp floor to the sequence axis.
    fn first_updated_at_or_after(&self, min: Timestamp) -> Result<Option<u64>, IndexError>;
}

/// Resolves a [`CollectionKey`] to its index, creating lazily.
///
/// One registry per deployment; the backend behind the returned trait
/// object is a configuration-time choice.
pub trait IndexRegistry: Send + Sync {
    fn index_for(&self, key: &CollectionKey) -> Result<Arc<dyn CollectionIndex>, IndexError>;

    /// Index only if the collection already exists.
    fn existing(&self, key: &CollectionKey) -> Option<Arc<dyn CollectionIndex>>;

    fn collections(&self) -> Vec<CollectionKey>;
}
