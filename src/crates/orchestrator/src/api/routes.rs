//! API routes and shared application state.

use crate::agents::AgentRuntime;
use crate::api::{chat, execute, health, webhook};
use crate::approval::{ApprovalManager, IssueTracker};
use crate::db::DatabaseConnection;
use crate::metrics::Metrics;
use crate::router::IntentRouter;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use steward_core::llm::ChatModel;
use steward_core::Engine;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The workflow engine
    pub engine: Arc<Engine>,
    /// Agent runtime, used directly by the chat fast path
    pub runtime: Arc<AgentRuntime>,
    /// Lexical intent classifier
    pub intent: Arc<IntentRouter>,
    /// Approval lifecycle manager
    pub manager: Arc<ApprovalManager>,
    /// Issue tracker, for health checks
    pub tracker: Arc<dyn IssueTracker>,
    /// Metric registry
    pub metrics: Arc<Metrics>,
    /// Database handle, for health checks
    pub db: DatabaseConnection,
    /// Chat model, for health checks
    pub model: Arc<dyn ChatModel>,
    /// Webhook HMAC secret; verification is skipped with a warning when
    /// absent (development only)
    pub webhook_secret: Option<String>,
    /// Tracker states mapped to approval
    pub approved_states: Arc<Vec<String>>,
    /// Tracker states mapped to rejection
    pub rejected_states: Arc<Vec<String>>,
}

/// Build the complete API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat/stream", post(chat::chat_stream))
        .route("/execute/stream", post(execute::execute_stream))
        .route("/webhooks/approval", post(webhook::approval_webhook))
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
