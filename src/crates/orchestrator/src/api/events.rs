//! Client-facing stream events.
//!
//! Every SSE frame is `{type, data, ts}`. Both endpoints and the webhook
//! path use this one vocabulary; engine events are mapped here and nowhere
//! else.

use axum::response::sse::Event as SseEvent;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use steward_core::EngineEvent;

/// One client-facing event frame.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Event type, also the SSE event name
    pub kind: String,
    /// Event payload
    pub data: Value,
    /// Emission time
    pub ts: DateTime<Utc>,
}

impl StreamEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: &str, data: Value) -> Self {
        Self {
            kind: kind.to_string(),
            data,
            ts: Utc::now(),
        }
    }

    /// A `content` chunk.
    pub fn content(text: &str) -> Self {
        Self::new("content", json!({"content": text}))
    }

    /// The terminal `done` frame of a chat stream.
    pub fn done() -> Self {
        Self::new("done", json!({}))
    }

    /// A redirect pointing the client at the execute endpoint.
    pub fn redirect(task: &str) -> Self {
        Self::new(
            "redirect",
            json!({"endpoint": "/execute/stream", "task": task}),
        )
    }

    /// An opaque error frame.
    pub fn error(message: &str) -> Self {
        Self::new("error", json!({"message": message}))
    }

    /// Render as an SSE frame.
    pub fn into_sse(self) -> SseEvent {
        let body = json!({
            "type": self.kind,
            "data": self.data,
            "ts": self.ts,
        });
        SseEvent::default()
            .event(&self.kind)
            .data(body.to_string())
    }
}

/// Map an engine event onto the client vocabulary.
///
/// Node lifecycle events map to `agent_selected`; the approval node is
/// invisible to clients until it actually requests approval. Returns
/// `None` for engine events with no client-facing counterpart.
pub fn map_engine_event(event: &EngineEvent, issue_url: Option<&str>) -> Option<StreamEvent> {
    match event {
        EngineEvent::NodeStarted { node, .. } => {
            if node == "approval" {
                None
            } else {
                Some(StreamEvent::new(
                    "agent_selected",
                    json!({"agent": node}),
                ))
            }
        }
        EngineEvent::NodeCompleted { .. } => None,
        EngineEvent::AgentMessage { content, node, .. } => Some(StreamEvent::new(
            "content",
            json!({"content": content, "agent": node}),
        )),
        EngineEvent::ApprovalRequested {
            approval_request_id,
            ..
        } => Some(StreamEvent::new(
            "approval_requested",
            json!({
                "approval_request_id": approval_request_id,
                "issue_url": issue_url,
            }),
        )),
        EngineEvent::ApprovalResolved { decision, .. } => Some(StreamEvent::new(
            "approval_resolved",
            json!({"decision": decision}),
        )),
        EngineEvent::RunCompleted { workflow_id, .. } => Some(StreamEvent::new(
            "workflow_completed",
            json!({"workflow_id": workflow_id}),
        )),
        EngineEvent::RunFailed {
            error, workflow_id, ..
        } => Some(StreamEvent::new(
            "error",
            json!({"message": error, "workflow_id": workflow_id}),
        )),
    }
}
