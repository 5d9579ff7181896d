//! Per-workspace configuration.

use serde::{Deserialize, Serialize};

/// Bounds and budgets applied to every collection in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Page size used when the request does not specify `max-results`.
    pub default_page_size: usize,
    /// Hard upper bound on any requested page size.
    pub max_page_size: usize,
    /// Bounded retry budget for physical content-body reads. Zero
    /// disables retries; exceeding the budget is a hard failure.
    pub content_read_retries: u32,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 500,
            content_read_retries: 3,
        }
    }
}

impl WorkspaceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_page_size(mut self, size: usize) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    pub fn with_content_read_retries(mut self, retries: u32) -> Self {
        self.content_read_retries = retries;
        self
    }
}
