//! The approval webhook.
//!
//! Consumes the external tracker's callback: verifies the HMAC signature
//! over the raw body, maps the new issue state onto a decision, resolves
//! the approval row and triggers the resume asynchronously. Duplicate
//! deliveries are safe thanks to the natural-key idempotency of resolve.

use crate::api::routes::AppState;
use crate::approval::ResolveOutcome;
use crate::OrchestratorError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use steward_core::{ApprovalDecision, EngineError};

type HmacSha256 = Hmac<Sha256>;

/// Signature header set by the tracker.
const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    issue_id: String,
    state: String,
    #[serde(default)]
    resolver: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// POST /webhooks/approval
pub async fn approval_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Err(err) = verify_signature(&state, &headers, &body) {
        tracing::warn!(error = %err, "webhook rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid signature"})),
        );
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "malformed payload"})),
            );
        }
    };

    let decision = if state.approved_states.iter().any(|s| s == &payload.state) {
        ApprovalDecision::Approved
    } else if state.rejected_states.iter().any(|s| s == &payload.state) {
        ApprovalDecision::Rejected
    } else {
        tracing::debug!(issue = %payload.issue_id, state = %payload.state, "webhook state ignored");
        return (StatusCode::ACCEPTED, Json(json!({"status": "ignored"})));
    };

    let resolver = payload.resolver.as_deref().unwrap_or("tracker-webhook");
    let outcome = state
        .manager
        .resolve(
            &payload.issue_id,
            decision,
            resolver,
            payload.reason.as_deref(),
        )
        .await;

    match outcome {
        Ok(ResolveOutcome::Resolved { ticket, .. }) => {
            // 202 now; the resume continues the thread in the background.
            let engine = state.engine.clone();
            let metrics = state.metrics.clone();
            let issue_id = payload.issue_id.clone();
            tokio::spawn(async move {
                match engine.resume(ticket, None).await {
                    Ok(_) => {}
                    Err(EngineError::StaleResume { .. }) => {
                        metrics.stale_resume_total.inc(&[]);
                        tracing::warn!(issue = %issue_id, "resume rejected: stale checkpoint");
                    }
                    Err(err) => {
                        tracing::error!(issue = %issue_id, error = %err, "resume failed");
                    }
                }
            });
            (StatusCode::ACCEPTED, Json(json!({"status": "resolving"})))
        }
        Ok(ResolveOutcome::AlreadyResolved(row)) => {
            state.metrics.webhook_duplicate_total.inc(&[]);
            (
                StatusCode::ACCEPTED,
                Json(json!({"status": "already_resolved", "terminal": row.status})),
            )
        }
        Err(OrchestratorError::NotFound(_)) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "unknown_issue"})),
        ),
        Err(err) => {
            tracing::error!(error = %err, "webhook resolution failed");
            (
                StatusCode::ACCEPTED,
                Json(json!({"status": "error"})),
            )
        }
    }
}

fn verify_signature(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), OrchestratorError> {
    let Some(secret) = &state.webhook_secret else {
        tracing::warn!("webhook secret not configured; skipping signature verification");
        return Ok(());
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| OrchestratorError::Unauthorized("missing signature header".to_string()))?;

    let signature = hex::decode(signature.trim_start_matches("sha256="))
        .map_err(|_| OrchestratorError::Unauthorized("signature is not hex".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| OrchestratorError::Unauthorized(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| OrchestratorError::Unauthorized("signature mismatch".to_string()))
}

/// Compute the hex signature for a body. Shared with tests and tooling.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_round_trip() {
        let secret = "shared-secret";
        let body = br#"{"issue_id":"ISS-1","state":"Done"}"#;
        let signature = sign_body(secret, body);

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        assert!(mac.verify_slice(&hex::decode(signature).unwrap()).is_ok());
    }

    #[test]
    fn test_tampered_body_fails_verification() {
        let secret = "shared-secret";
        let signature = sign_body(secret, b"original");

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(b"tampered");
        assert!(mac.verify_slice(&hex::decode(signature).unwrap()).is_err());
    }
}
