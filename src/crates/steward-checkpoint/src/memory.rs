//! In-memory checkpoint store.
//!
//! Reference implementation of [`CheckpointStore`] backed by a thread-safe
//! map of per-thread checkpoint vectors. Used by tests and by deployments
//! that do not need durability across restarts.

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Storage = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// Checkpoint store keeping all checkpoints in process memory.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: Storage,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints currently held for a thread.
    pub async fn thread_len(&self, thread_id: &str) -> usize {
        self.storage
            .read()
            .await
            .get(thread_id)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let mut storage = self.storage.write().await;
        let entries = storage.entry(checkpoint.thread_id.clone()).or_default();

        // Sequence numbers are strictly increasing per thread; a duplicate or
        // out-of-order insert means another writer already advanced.
        if let Some(last) = entries.last() {
            if checkpoint.checkpoint_id <= last.checkpoint_id {
                return Err(CheckpointError::Conflict {
                    thread_id: checkpoint.thread_id,
                    checkpoint_id: checkpoint.checkpoint_id,
                });
            }
        }

        entries.push(checkpoint);
        Ok(())
    }

    async fn get(&self, thread_id: &str, checkpoint_id: u64) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(thread_id)
            .and_then(|v| v.iter().find(|c| c.checkpoint_id == checkpoint_id))
            .cloned())
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).and_then(|v| v.last()).cloned())
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(thread_id).cloned().unwrap_or_default())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.storage.write().await.remove(thread_id);
        Ok(())
    }

    async fn prune_expired(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut storage = self.storage.write().await;
        let mut removed = 0;

        for entries in storage.values_mut() {
            let latest = entries.last().map(|c| c.checkpoint_id);
            let before = entries.len();
            entries.retain(|c| Some(c.checkpoint_id) == latest || c.created_at >= older_than);
            removed += (before - entries.len()) as u64;
        }

        Ok(removed)
    }
}
