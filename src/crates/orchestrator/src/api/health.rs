//! Health and metrics endpoints.

use crate::api::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// GET /health
///
/// The checkpoint store is the only required dependency; a down tracker or
/// LLM degrades the status without failing the probe.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store_ok = state.db.health_check().await.is_ok();
    let tracker_ok = state.tracker.ping().await;
    let llm_ok = state.model.is_available().await;

    let status = if store_ok {
        if tracker_ok && llm_ok {
            "ok"
        } else {
            "degraded"
        }
    } else {
        "down"
    };

    let body = json!({
        "status": status,
        "store": store_ok,
        "tracker": tracker_ok,
        "llm": llm_ok,
    });

    let code = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
