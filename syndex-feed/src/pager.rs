//! Feed pagination over the ordered entry index.

use syndex_core::{
    CategoryQuery, FeedQueryParams, IndexError, SyndexError, SyndexResult, WorkspaceConfig,
    EntryRecord,
};
use syndex_storage::CollectionIndex;

use crate::eval::compile_query;

/// One page of a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub entries: Vec<EntryRecord>,
    /// Sequence of the last entry returned; the next page's exclusive
    /// floor. For an empty page this is the position the reader should
    /// resume from (unchanged floor, or the high-water mark in scroll
    /// mode).
    pub end_sequence: u64,
    pub has_more: bool,
}

/// Turns (floor, page size) into a bounded slice of the ordered index,
/// optionally filtered by a category query.
pub struct FeedPager {
    config: WorkspaceConfig,
}

impl FeedPager {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    /// Resolve the request's floors to one exclusive sequence floor.
    /// When both `start_index` and `updated_min` are present, the later
    /// of the two resolved floors wins.
    fn resolve_floor(
        &self,
        index: &dyn CollectionIndex,
        params: &FeedQueryParams,
    ) -> Result<u64, IndexError> {
        let mut floor = params.floor();
        if let Some(min) = params.updated_min {
            // An absent match means nothing was updated since `min`, so
            // the floor moves past the high-water mark.
            let ts_floor = match index.first_updated_at_or_after(min)? {
                Some(seq) => seq.saturating_sub(1),
                None => index.high_water_mark()?,
            };
            floor = floor.max(ts_floor);
        }
        Ok(floor)
    }

    /// Produce one page. `params.start_index` is the exclusive floor
    /// from the previous page (absent for the first page).
    pub fn page(
        &self,
        index: &dyn CollectionIndex,
        query: Option<&CategoryQuery>,
        params: &FeedQueryParams,
    ) -> SyndexResult<FeedPage> {
        let floor = self.resolve_floor(index, params)?;
        let high_water = index.high_water_mark()?;

        if floor >= high_water {
            if params.scroll_on_unmodified {
                // Long-polling clients still learn the end-of-feed
                // position.
                return Ok(FeedPage {
                    entries: Vec::new(),
                    end_sequence: high_water,
                    has_more: false,
                });
            }
            return Err(SyndexError::NotModified);
        }

        let page_size = params.effective_page_size(&self.config);
        let start = floor + 1;

        let mut entries = Vec::with_capacity(page_size);
        let mut has_more = false;
        match query {
            Some(query) => {
                let mut stream = compile_query(query, index, start)?;
                for seq in stream.by_ref() {
                    if entries.len() == page_size {
                        has_more = true;
                        break;
                    }
                    // A sequence emitted by the evaluator always has a
                    // live record; a racing removal just shortens the
                    // page.
                    if let Some(record) = index.record_at(seq)? {
                        entries.push(record);
                    }
                }
            }
            None => {
                for record in index.tail_from(start)? {
                    if entries.len() == page_size {
                        has_more = true;
                        break;
                    }
                    entries.push(record);
                }
            }
        }

        let end_sequence = entries.last().map(|r| r.sequence).unwrap_or(floor);
        Ok(FeedPage {
            entries,
            end_sequence,
            has_more,
        })
    }
}
