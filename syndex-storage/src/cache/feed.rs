//! Joined-feed specifications and their derived identifiers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use syndex_core::CollectionKey;

/// Identifier of a cached aggregate feed, derived from its
/// specification. Stable across processes: the same join always hashes
/// to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedId(String);

impl FeedId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Specification of one aggregate (joined) feed: a set of collections
/// joined by a shared category scheme, optionally narrowed to a locale.
///
/// Created once per distinct specification the first time it is queried
/// or explicitly registered; destroyed only by explicit eviction. Its
/// lifecycle is independent of the entries it caches information about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAggregateFeed {
    pub feed_id: FeedId,
    pub joined_collections: Vec<CollectionKey>,
    pub scheme: String,
    pub locale: Option<String>,
}

impl CachedAggregateFeed {
    pub fn new(
        joined_collections: Vec<CollectionKey>,
        scheme: impl Into<String>,
        locale: Option<String>,
    ) -> Self {
        let scheme = scheme.into();
        let feed_id = derive_feed_id(&joined_collections, &scheme, locale.as_deref());
        Self {
            feed_id,
            joined_collections,
            scheme,
            locale,
        }
    }

    /// True when the feed's join includes the collection.
    pub fn joins(&self, collection: &CollectionKey) -> bool {
        self.joined_collections.contains(collection)
    }

    /// Locale-compatibility filter for first-time term rows: the entry
    /// locale must match the feed's, or either side is locale-agnostic.
    pub fn locale_compatible(&self, entry_locale: Option<&str>) -> bool {
        match (&self.locale, entry_locale) {
            (None, _) | (_, None) => true,
            (Some(feed), Some(entry)) => feed == entry,
        }
    }
}

/// Hash of joined collections + scheme + locale.
fn derive_feed_id(collections: &[CollectionKey], scheme: &str, locale: Option<&str>) -> FeedId {
    let mut hasher = Sha256::new();
    for key in collections {
        hasher.update(key.workspace.as_bytes());
        hasher.update([0u8]);
        hasher.update(key.collection.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(scheme.as_bytes());
    hasher.update([0u8]);
    if let Some(locale) = locale {
        hasher.update(locale.as_bytes());
    }
    FeedId(hex::encode(&hasher.finalize()[..16]))
}
