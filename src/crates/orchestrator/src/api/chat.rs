//! The conversational streaming endpoint.
//!
//! Always runs in ask mode and never routes to worker agents: queries are
//! answered by the conversational agent directly (no supervisor, no
//! checkpoint), and task submissions are redirected to the execute
//! endpoint with a single `redirect` event.

use crate::api::events::StreamEvent;
use crate::api::routes::AppState;
use crate::router::{parse_command, Command, IntentKind};
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use steward_core::{Message, SessionMode, WorkflowState};
use uuid::Uuid;

/// Request body of `/chat/stream` and `/execute/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    /// The user's message
    pub message: String,
    /// Stable session (thread) identifier
    #[serde(default)]
    pub session_id: Option<String>,
    /// Workspace context merged into the state
    #[serde(default)]
    pub context: Option<Value>,
}

/// POST /chat/stream
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<StreamRequest>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let stream = async_stream::stream! {
        for event in chat_events(&state, &request).await {
            yield Ok(event.into_sse());
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Produce the ordered event list for one chat turn.
async fn chat_events(state: &AppState, request: &StreamRequest) -> Vec<StreamEvent> {
    let message = request.message.trim();

    if let Some(command) = parse_command(message) {
        return match command {
            Command::Execute(task) => vec![StreamEvent::redirect(&task)],
            Command::Help => vec![
                StreamEvent::content(
                    "I can answer questions here, or run engineering tasks via \
                     /execute <task>. Other commands: /status, /cancel.",
                ),
                StreamEvent::done(),
            ],
            Command::Status => vec![status_event(state, request).await, StreamEvent::done()],
            Command::Cancel => {
                if let Some(session) = &request.session_id {
                    state.engine.cancel(session);
                }
                vec![
                    StreamEvent::content("Cancellation requested."),
                    StreamEvent::done(),
                ]
            }
        };
    }

    let intent = state.intent.classify(message, SessionMode::Ask);
    if intent.kind == IntentKind::TaskSubmission {
        tracing::info!(confidence = intent.confidence, "redirecting task to /execute/stream");
        return vec![StreamEvent::redirect(message)];
    }

    // Conversational fast path: one agent turn, no tool loading, no
    // supervisor, no checkpoint.
    let thread_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut workflow = WorkflowState::new(thread_id, Uuid::new_v4().to_string(), SessionMode::Ask);
    workflow.push_message(Message::user(message));

    match state.runtime.invoke_untooled("conversational", &workflow).await {
        Ok(turn) => {
            let mut events: Vec<StreamEvent> = turn
                .messages
                .iter()
                .filter(|m| m.is_assistant() && !m.content().is_empty())
                .map(|m| StreamEvent::content(m.content()))
                .collect();
            events.push(StreamEvent::done());
            events
        }
        Err(err) => {
            tracing::error!(error = %err, "conversational turn failed");
            vec![StreamEvent::error("the assistant is unavailable right now")]
        }
    }
}

async fn status_event(state: &AppState, request: &StreamRequest) -> StreamEvent {
    let Some(session) = &request.session_id else {
        return StreamEvent::content("No session id provided; nothing to report.");
    };

    match state.engine.latest_state(session).await {
        Ok(Some((seq, workflow))) => StreamEvent::content(&format!(
            "Thread {session}: last node '{}', next '{}', {} checkpoints, approval status {}.",
            workflow.current_agent,
            workflow.next_agent,
            seq,
            workflow.approval_status.as_str(),
        )),
        Ok(None) => StreamEvent::content("No workflow recorded for this session yet."),
        Err(err) => {
            tracing::warn!(error = %err, "status lookup failed");
            StreamEvent::error("status lookup failed")
        }
    }
}
