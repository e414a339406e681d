//! Checkpoint identity and payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable snapshot of workflow state at a node boundary.
///
/// Identity is `(thread_id, checkpoint_id)`; `checkpoint_id` is a per-thread
/// sequence number assigned by the engine. The payload is the serialized
/// workflow state as a JSON value, so the store round-trips it without
/// interpreting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Thread this checkpoint belongs to
    pub thread_id: String,

    /// Per-thread monotone sequence number
    pub checkpoint_id: u64,

    /// Sequence number of the previous checkpoint, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,

    /// Name of the node that just ran
    pub node: String,

    /// Serialized workflow state
    pub state: serde_json::Value,

    /// When the checkpoint was written
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint for the given thread and sequence number.
    pub fn new(
        thread_id: impl Into<String>,
        checkpoint_id: u64,
        node: impl Into<String>,
        state: serde_json::Value,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id,
            parent_id: checkpoint_id.checked_sub(1).filter(|_| checkpoint_id > 1),
            node: node.into(),
            state,
            created_at: Utc::now(),
        }
    }

    /// Set the parent sequence number explicitly.
    pub fn with_parent(mut self, parent_id: u64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
