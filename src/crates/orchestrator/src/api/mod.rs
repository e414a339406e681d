//! Streaming HTTP API.
//!
//! Two SSE endpoints (conversational and task-executing), the approval
//! webhook, health and metrics. Engine events map onto a single
//! client-facing event vocabulary in [`events`], shared by every stream.

pub mod chat;
pub mod events;
pub mod execute;
pub mod health;
pub mod routes;
pub mod webhook;

pub use routes::{create_router, AppState};
