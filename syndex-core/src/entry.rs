//! Entry and category value types.
//!
//! An [`EntryRecord`] is the unit of the store: a versioned document's
//! metadata, owned by exactly one collection, positioned on that
//! collection's sequence axis and tagged with category terms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Entry identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntryId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 digest of an entry's document body.
pub type ContentDigest = [u8; 32];

/// Generate a new UUIDv7 EntryId (timestamp-sortable).
pub fn new_entry_id() -> EntryId {
    Uuid::now_v7()
}

/// Compute the SHA-256 digest of a document body.
pub fn compute_content_digest(content: &[u8]) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

/// Render a content digest as lowercase hex.
pub fn digest_hex(digest: &ContentDigest) -> String {
    hex::encode(digest)
}

// ============================================================================
// COLLECTION KEY
// ============================================================================

/// Identifies one collection within one workspace.
///
/// The collection is the unit of sequence assignment and of mutual
/// exclusion: writes to different collections never block each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionKey {
    pub workspace: String,
    pub collection: String,
}

impl CollectionKey {
    pub fn new(workspace: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.collection)
    }
}

// ============================================================================
// CATEGORY TERM
// ============================================================================

/// A (scheme, term) tag attached to an entry.
///
/// Two terms are equal iff scheme and term match; the label is
/// descriptive only and excluded from equality, ordering and hashing.
/// Immutable value type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTerm {
    pub scheme: String,
    pub term: String,
    pub label: Option<String>,
}

impl CategoryTerm {
    pub fn new(scheme: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            term: term.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl PartialEq for CategoryTerm {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.term == other.term
    }
}

impl Eq for CategoryTerm {}

impl Hash for CategoryTerm {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.term.hash(state);
    }
}

impl PartialOrd for CategoryTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CategoryTerm {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.scheme, &self.term).cmp(&(&other.scheme, &other.term))
    }
}

impl fmt::Display for CategoryTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.scheme, self.term)
    }
}

// ============================================================================
// REVISION CHECK
// ============================================================================

/// Marker in an edit reference selecting the optimistic-concurrency
/// override (forces the write regardless of the stored revision).
pub const REVISION_OVERRIDE_TOKEN: &str = "*";

/// Revision expectation supplied with every entry mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionCheck {
    /// Succeed only if the stored revision equals this value.
    Exact(i64),
    /// Bypass the check entirely (corrective/administrative writes).
    Override,
}

impl RevisionCheck {
    /// Parse the revision component of an edit reference.
    ///
    /// `*` selects [`RevisionCheck::Override`]; anything else must be a
    /// non-negative integer.
    pub fn parse(token: &str) -> Result<Self, crate::error::QueryError> {
        if token == REVISION_OVERRIDE_TOKEN {
            return Ok(Self::Override);
        }
        token
            .parse::<i64>()
            .ok()
            .filter(|r| *r >= 0)
            .map(Self::Exact)
            .ok_or_else(|| crate::error::QueryError::BadRevisionToken {
                token: token.to_string(),
            })
    }

    /// True when this check accepts the given stored revision.
    pub fn accepts(&self, stored: i64) -> bool {
        match self {
            Self::Exact(expected) => *expected == stored,
            Self::Override => true,
        }
    }
}

// ============================================================================
// ENTRY RECORD
// ============================================================================

/// Current metadata of one versioned document.
///
/// `sequence` is assigned exactly once, at first insertion, and never
/// reused: obliteration frees the identity but the consumed position on
/// the collection's sequence axis stays consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub collection: CollectionKey,
    pub entry_id: EntryId,
    pub locale: Option<String>,
    /// Monotonic per-collection write position; the feed ordering axis.
    pub sequence: u64,
    /// Per-entry mutation counter, incremented by exactly 1 per
    /// successful mutation.
    pub revision: i64,
    pub deleted: bool,
    pub categories: BTreeSet<CategoryTerm>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub content_digest: ContentDigest,
}

impl EntryRecord {
    /// Create a fresh record ready for first insertion (sequence 0 until
    /// the collection index assigns one).
    pub fn new(collection: CollectionKey, entry_id: EntryId, body: &[u8]) -> Self {
        let now = Utc::now();
        Self {
            collection,
            entry_id,
            locale: None,
            sequence: 0,
            revision: 0,
            deleted: false,
            categories: BTreeSet::new(),
            created_at: now,
            updated_at: now,
            content_digest: compute_content_digest(body),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = CategoryTerm>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    /// True when the entry carries a category under the given scheme.
    pub fn carries_scheme(&self, scheme: &str) -> bool {
        self.categories.iter().any(|c| c.scheme == scheme)
    }
}
