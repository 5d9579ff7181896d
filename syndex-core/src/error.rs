//! Error types for syndex operations

use crate::entry::{CollectionKey, EntryId};
use std::time::Duration;
use thiserror::Error;

/// Durable-index and entry-store faults.
///
/// These are transient storage errors: the core does not retry them
/// internally (bounded retry exists only for the physical content
/// store, which owns its own budget).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: CollectionKey },

    #[error("storage fault on {collection}: {reason}")]
    StorageFault {
        collection: CollectionKey,
        reason: String,
    },

    #[error("index corrupted on {collection}: {reason}")]
    Corrupted {
        collection: CollectionKey,
        reason: String,
    },
}

/// Malformed category queries and edit references.
///
/// Rejected before any index is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("empty category query")]
    Empty,

    #[error("unbalanced scheme delimiter in {input:?}")]
    UnbalancedScheme { input: String },

    #[error("dangling {operator} operator in category query")]
    DanglingOperator { operator: String },

    #[error("empty term in category query")]
    EmptyTerm,

    #[error("invalid revision token {token:?}")]
    BadRevisionToken { token: String },

    #[error("unsupported join specification: {reason}")]
    BadJoin { reason: String },
}

/// Advisory-lock acquisition failures.
///
/// Fatal for the operation holding the critical section; never retried
/// automatically at this layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("lock {name:?} not acquired within {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("lock {name:?} acquisition chosen as deadlock victim")]
    Deadlock { name: String },

    #[error("lock {name:?} acquisition cancelled")]
    Cancelled { name: String },
}

/// Entry mutation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// Revision mismatch on update/delete. Carries the revision the
    /// caller needs to retry.
    #[error("revision conflict on {entry_id}: supplied {supplied}, current {current}")]
    Conflict {
        entry_id: EntryId,
        supplied: i64,
        current: i64,
    },

    #[error("entry not found: {entry_id} in {collection}")]
    EntryNotFound {
        collection: CollectionKey,
        entry_id: EntryId,
    },

    #[error("entry already exists: {entry_id} in {collection}")]
    AlreadyExists {
        collection: CollectionKey,
        entry_id: EntryId,
    },

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Aggregate-feed cache faults.
///
/// A cache fault never fails the entry write that triggered it; the
/// write path logs and proceeds (staleness over blocked writers).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("aggregate feed not registered: {feed_id}")]
    FeedNotRegistered { feed_id: String },

    #[error("aggregate feed already evicted: {feed_id}")]
    FeedEvicted { feed_id: String },

    #[error("cache storage fault: {reason}")]
    StorageFault { reason: String },

    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Top-level error for syndex operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyndexError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Floor beyond the collection's high-water mark; distinct from an
    /// empty-but-valid page. Surfaced upward as HTTP 304 by the
    /// protocol layer.
    #[error("feed not modified since requested floor")]
    NotModified,
}

/// Result type alias for syndex operations.
pub type SyndexResult<T> = Result<T, SyndexError>;
