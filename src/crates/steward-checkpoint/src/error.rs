//! Error types for checkpoint storage backends.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur when persisting or loading checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// A checkpoint with the same (thread_id, checkpoint_id) already exists.
    ///
    /// Surfaced when two writers race to advance the same thread; the loser
    /// must abort its advance.
    #[error("checkpoint conflict on thread '{thread_id}' at sequence {checkpoint_id}")]
    Conflict {
        /// Thread whose sequence was contended
        thread_id: String,
        /// Sequence number both writers tried to claim
        checkpoint_id: u64,
    },

    /// No checkpoint exists for the requested thread or sequence number.
    #[error("checkpoint not found for thread '{0}'")]
    NotFound(String),

    /// The backing store could not be reached.
    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),

    /// State payload could not be serialized or deserialized.
    #[error("checkpoint serialization failed: {0}")]
    Serialization(String),
}

impl CheckpointError {
    /// Whether the operation may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckpointError::Unavailable(_))
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Serialization(err.to_string())
    }
}
