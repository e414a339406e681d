//! Multi-agent workflow orchestration service for steward.
//!
//! Accepts natural-language software-engineering requests over two
//! streaming endpoints, routes work across specialised agents under a
//! supervisor, and pauses high-risk operations for human approval mirrored
//! to an external issue tracker.

pub mod agents;
pub mod api;
pub mod approval;
pub mod config;
pub mod db;
pub mod graph;
pub mod metrics;
pub mod nodes;
pub mod risk;
pub mod router;
pub mod tools;

use thiserror::Error;

/// Errors that can occur in the orchestration service.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Engine-level failure
    #[error(transparent)]
    Engine(#[from] steward_core::EngineError),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(String),

    /// Issue tracker call failed
    #[error("tracker error: {0}")]
    Tracker(String),

    /// The approval row already reached a terminal state.
    ///
    /// Idempotent: callers observing this return the existing state rather
    /// than raising.
    #[error("approval already resolved with status '{status}'")]
    AlreadyResolved {
        /// Terminal status the row holds
        status: String,
    },

    /// Configuration file or value invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook signature missing or invalid
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request payload malformed
    #[error("malformed request: {0}")]
    Malformed(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        OrchestratorError::Database(err.to_string())
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
