//! Per-thread advisory locks.
//!
//! At most one task may advance a given thread at a time. `advance` and
//! `resume` both acquire the thread's lock before touching checkpoints and
//! hold it until the run interrupts, completes or fails. Acquisition waits
//! a bounded time, then fails with `Busy`.

use crate::error::{EngineError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-thread advisory locks.
#[derive(Default)]
pub struct ThreadLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Guard proving exclusive ownership of a thread; released on drop.
pub type ThreadGuard = OwnedMutexGuard<()>;

impl ThreadLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a thread, waiting up to `timeout`.
    pub async fn acquire(&self, thread_id: &str, timeout: Duration) -> Result<ThreadGuard> {
        let lock = self
            .locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| EngineError::Busy(thread_id.to_string()))
    }

    /// Acquire without waiting; fails immediately if held.
    pub fn try_acquire(&self, thread_id: &str) -> Result<ThreadGuard> {
        let lock = self
            .locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.try_lock_owned()
            .map_err(|_| EngineError::Busy(thread_id.to_string()))
    }
}
