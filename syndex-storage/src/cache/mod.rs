//! Aggregate-feed cache storage.
//!
//! The cache maps a joined-feed specification to the maximum
//! write-timestamp observed per category term across all joined
//! collections. Rows are multi-writer: correctness comes from
//! monotonic-max conditional updates and re-verified inserts, not
//! per-row locks. The protocol driving these primitives lives in
//! syndex-feed; this module holds the feed specification, the backend
//! trait and the in-memory backend.

mod feed;
mod memory;
mod traits;

pub use feed::{CachedAggregateFeed, FeedId};
pub use memory::InMemoryCacheBackend;
pub use traits::{FeedCacheBackend, FeedTimestampRow};
