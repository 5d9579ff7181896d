//! Feed query parameters handed down from the protocol layer.

use crate::config::WorkspaceConfig;
use crate::entry::Timestamp;
use serde::{Deserialize, Serialize};

/// Parameters of one feed page request.
///
/// `start_index` is the opaque resume position: the `end_sequence` of
/// the previous page (exclusive floor). `updated_min` is the alternate
/// floor expressed on the timestamp axis; when both are present the
/// later of the two resolved floors wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedQueryParams {
    /// Requested page size; bounded by the workspace maximum.
    pub max_results: Option<usize>,
    /// Exclusive sequence floor from the previous page.
    pub start_index: Option<u64>,
    /// Alternate floor: only entries updated at or after this instant.
    pub updated_min: Option<Timestamp>,
    /// Reader locale, used by aggregate feeds.
    pub locale: Option<String>,
    /// Select the "empty page carrying the high-water mark" behavior
    /// instead of the not-modified signal when the floor is past the
    /// end of the feed.
    pub scroll_on_unmodified: bool,
}

impl FeedQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn with_start_index(mut self, start: u64) -> Self {
        self.start_index = Some(start);
        self
    }

    pub fn with_updated_min(mut self, min: Timestamp) -> Self {
        self.updated_min = Some(min);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_scroll_on_unmodified(mut self, scroll: bool) -> Self {
        self.scroll_on_unmodified = scroll;
        self
    }

    /// Effective page size after applying workspace bounds.
    pub fn effective_page_size(&self, config: &WorkspaceConfig) -> usize {
        self.max_results
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size)
            .max(1)
    }

    /// Effective exclusive sequence floor (0 for the first page).
    pub fn floor(&self) -> u64 {
        self.start_index.unwrap_or(0)
    }
}
