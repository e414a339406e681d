//! Storage backend trait for checkpoint persistence.

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Core trait for implementing checkpoint storage backends.
///
/// Implementations must be `Send + Sync` and safe under concurrent access
/// from independent threads. Within a single thread of execution the engine
/// serializes writes; across threads the backend only needs to guarantee
/// that `put` is atomic and that a duplicate `(thread_id, checkpoint_id)`
/// insert fails with [`CheckpointError::Conflict`](crate::CheckpointError::Conflict).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint atomically.
    ///
    /// Either the checkpoint becomes visible in full or not at all. If a
    /// checkpoint with the same identity already exists the call fails with
    /// `Conflict`, which the engine treats as "another writer already
    /// advanced this thread".
    async fn put(&self, checkpoint: Checkpoint) -> Result<()>;

    /// Fetch a specific checkpoint, or `None` if it does not exist.
    async fn get(&self, thread_id: &str, checkpoint_id: u64) -> Result<Option<Checkpoint>>;

    /// Fetch the checkpoint with the highest sequence number for a thread.
    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>>;

    /// List all checkpoints for a thread in ascending sequence order.
    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>>;

    /// Delete every checkpoint belonging to a thread.
    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    /// Prune non-latest checkpoints created before the cutoff.
    ///
    /// The latest checkpoint of every thread is always retained; it is the
    /// thread's resume point. Returns the number of checkpoints removed.
    async fn prune_expired(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let _ = older_than;
        Ok(0)
    }
}
