//! syndex Core - Entry and Category Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no indexing or cache logic.

pub mod config;
pub mod entry;
pub mod error;
pub mod lock;
pub mod params;
pub mod query;

pub use config::WorkspaceConfig;
pub use entry::{
    compute_content_digest, digest_hex, new_entry_id, CategoryTerm, CollectionKey, ContentDigest,
    EntryId, EntryRecord, RevisionCheck, Timestamp, REVISION_OVERRIDE_TOKEN,
};
pub use error::{
    CacheError, IndexError, LockError, QueryError, SyndexError, SyndexResult, WriteError,
};
pub use lock::{LockName, LOCK_CACHE_BOOTSTRAP};
pub use params::FeedQueryParams;
pub use query::{parse_category_query, CategoryQuery};
