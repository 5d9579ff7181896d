//! Named advisory-lock contract.
//!
//! Cache-table bootstrap spans multiple cache mutations and runs under a
//! cooperative, named application-level lock. The contract is fixed
//! here; the service trait and in-process implementation live in
//! syndex-storage. Acquisition failure (timeout, deadlock victim,
//! cancellation) is fatal for the operation holding the critical
//! section and is never retried at this layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the advisory lock guarding aggregate-cache bootstrap.
pub const LOCK_CACHE_BOOTSTRAP: &str = "syndex.cache.bootstrap";

/// Identifier of a named advisory lock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockName(pub String);

impl LockName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LockName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
