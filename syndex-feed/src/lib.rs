//! syndex Feed - Query Evaluation, Pagination and the Write Path
//!
//! The engine over the storage traits: compiles boolean category
//! queries into lazy merges over the term indices, pages the ordered
//! entry index, applies entry writes under optimistic concurrency and
//! keeps the aggregate-feed timestamp cache current with the
//! race-tolerant update protocol.

pub mod cache_service;
pub mod content;
pub mod eval;
pub mod pager;
pub mod write;

pub use cache_service::AggregateFeedCacheService;
pub use content::{ContentStore, RetryingContentStore};
pub use eval::compile_query;
pub use pager::{FeedPage, FeedPager};
pub use write::{EntryUpdate, FeedService};
