//! Named advisory lock service.
//!
//! The aggregate-cache bootstrap critical section spans multiple cache
//! mutations and runs under a cooperative named lock. The contract is
//! deployment-neutral: a relational application-lock procedure, a
//! distributed lock service or the in-process implementation below all
//! satisfy it. Acquisition failure is fatal for the operation, never
//! retried here.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use syndex_core::{LockError, LockName};

/// Releases the named lock when dropped.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Cooperative named-mutex service.
pub trait LockService: Send + Sync {
    /// Acquire the named lock, waiting at most `timeout`.
    fn acquire(&self, name: &LockName, timeout: Duration) -> Result<LockGuard, LockError>;
}

#[derive(Default)]
struct LockSlot {
    held: Mutex<bool>,
    freed: Condvar,
}

/// In-process [`LockService`] backed by one mutex/condvar pair per
/// lock name.
#[derive(Default)]
pub struct InProcessLockService {
    slots: Mutex<HashMap<LockName, Arc<LockSlot>>>,
}

impl InProcessLockService {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &LockName) -> Arc<LockSlot> {
        let mut slots = self.slots.lock().unwrap();
        slots.entry(name.clone()).or_default().clone()
    }
}

impl LockService for InProcessLockService {
    fn acquire(&self, name: &LockName, timeout: Duration) -> Result<LockGuard, LockError> {
        let slot = self.slot(name);
        let deadline = Instant::now() + timeout;

        let mut held = slot.held.lock().unwrap();
        while *held {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or_else(|| LockError::Timeout {
                    name: name.as_str().to_string(),
                    timeout,
                })?;
            let (guard, result) = slot.freed.wait_timeout(held, remaining).unwrap();
            held = guard;
            if result.timed_out() && *held {
                return Err(LockError::Timeout {
                    name: name.as_str().to_string(),
                    timeout,
                });
            }
        }
        *held = true;
        drop(held);

        let released = slot.clone();
        Ok(LockGuard::new(move || {
            let mut held = released.held.lock().unwrap();
            *held = false;
            released.freed.notify_one();
        }))
    }
}
