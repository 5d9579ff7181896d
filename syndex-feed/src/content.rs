//! Physical content reads with a bounded retry budget.
//!
//! Document bodies live in an opaque durable store that is known to be
//! flaky on reads. The wrapper retries up to the workspace-configured
//! budget; exceeding it surfaces the last error as a hard failure,
//! never silently.

use syndex_core::{CollectionKey, EntryId, IndexError};

/// Opaque durable store of document bodies.
pub trait ContentStore: Send + Sync {
    /// Read the body of one entry revision.
    fn read_content(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
        revision: i64,
    ) -> Result<Vec<u8>, IndexError>;
}

/// [`ContentStore`] wrapper with a bounded retry budget for reads.
pub struct RetryingContentStore<S> {
    inner: S,
    retries: u32,
}

impl<S: ContentStore> RetryingContentStore<S> {
    pub fn new(inner: S, retries: u32) -> Self {
        Self { inner, retries }
    }
}

impl<S: ContentStore> ContentStore for RetryingContentStore<S> {
    fn read_content(
        &self,
        collection: &CollectionKey,
        entry_id: EntryId,
        revision: i64,
    ) -> Result<Vec<u8>, IndexError> {
        let mut attempt = 0;
        loop {
            match self.inner.read_content(collection, entry_id, revision) {
                Ok(body) => return Ok(body),
                Err(err) if attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(
                        collection = %collection,
                        %entry_id,
                        attempt,
                        error = %err,
                        "content read failed, retrying"
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}
