//! Error types for graph construction and execution.

use steward_checkpoint::CheckpointError;
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while building or running a workflow graph.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Graph structure or state invariant violated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A node's handler could not complete.
    #[error("node '{node}' failed: {error}")]
    NodeFailed {
        /// Name of the node that failed
        node: String,
        /// Error message from the handler
        error: String,
    },

    /// An LLM or tool invocation inside an agent failed.
    #[error("agent error: {message}")]
    Agent {
        /// Provider or executor error message
        message: String,
        /// Whether a retry may succeed
        retryable: bool,
    },

    /// Lost a single-writer race: another writer advanced the thread.
    #[error("thread '{0}' was advanced by another writer")]
    Conflict(String),

    /// The checkpoint store is unreachable.
    #[error("checkpoint store unavailable: {0}")]
    Store(String),

    /// State payload could not be serialized or deserialized.
    #[error("state serialization failed: {0}")]
    Serialization(String),

    /// A resume ticket referenced a checkpoint that is no longer the latest.
    #[error(
        "stale resume for thread '{thread_id}': ticket references checkpoint \
         {ticket_checkpoint} but latest is {latest_checkpoint}"
    )]
    StaleResume {
        /// Thread the ticket referenced
        thread_id: String,
        /// Checkpoint the ticket carried
        ticket_checkpoint: u64,
        /// Latest checkpoint at the moment of resume
        latest_checkpoint: u64,
    },

    /// The per-thread advisory lock could not be acquired in time.
    #[error("thread '{0}' is busy: another run holds the advisory lock")]
    Busy(String),

    /// The run exceeded its node-transition budget.
    #[error("run hop limit of {limit} transitions exceeded")]
    HopLimitExceeded {
        /// Configured per-run limit
        limit: u32,
    },

    /// The run was cancelled between node boundaries.
    #[error("run on thread '{0}' was cancelled")]
    Cancelled(String),

    /// A referenced node does not exist in the graph.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// A referenced thread or checkpoint does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl EngineError {
    /// Whether the operation may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Store(_) => true,
            EngineError::Agent { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<CheckpointError> for EngineError {
    fn from(err: CheckpointError) -> Self {
        match err {
            CheckpointError::Conflict { thread_id, .. } => EngineError::Conflict(thread_id),
            CheckpointError::NotFound(id) => EngineError::NotFound(id),
            CheckpointError::Unavailable(msg) => EngineError::Store(msg),
            CheckpointError::Serialization(msg) => EngineError::Serialization(msg),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
