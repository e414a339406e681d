//! The task-executing streaming endpoint.

use crate::api::chat::StreamRequest;
use crate::api::events::{map_engine_event, StreamEvent};
use crate::api::routes::AppState;
use crate::router::parse_command;
use crate::router::Command;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use futures::Stream;
use serde_json::json;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use steward_core::{Engine, EngineEvent, Message, RunRequest, SessionMode};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Cancels the run if the client departs before it finishes.
struct DisconnectGuard {
    engine: Arc<Engine>,
    thread_id: String,
    finished: Arc<AtomicBool>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if !self.finished.load(Ordering::SeqCst) {
            tracing::info!(thread_id = %self.thread_id, "client disconnected, cancelling run");
            self.engine.cancel(&self.thread_id);
        }
    }
}

/// POST /execute/stream
pub async fn execute_stream(
    State(state): State<AppState>,
    Json(request): Json<StreamRequest>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let workflow_id = Uuid::new_v4().to_string();
    let thread_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // `/execute <task>` submitted straight to this endpoint still works.
    let task = match parse_command(&request.message) {
        Some(Command::Execute(args)) => args,
        _ => request.message.trim().to_string(),
    };

    let mut project_context = BTreeMap::new();
    if let Some(context) = &request.context {
        if let Some(map) = context.as_object() {
            for (key, value) in map {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                project_context.insert(key.clone(), rendered);
            }
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
    let finished = Arc::new(AtomicBool::new(false));

    {
        let engine = state.engine.clone();
        let metrics = state.metrics.clone();
        let finished = finished.clone();
        let thread_id = thread_id.clone();
        let workflow_id = workflow_id.clone();
        let run = RunRequest {
            thread_id: thread_id.clone(),
            workflow_id: workflow_id.clone(),
            session_mode: SessionMode::Agent,
            messages: vec![Message::user(task)],
            project_context,
        };

        tokio::spawn(async move {
            metrics.active_workflows.inc(&[]);
            let result = engine.run(run, Some(tx.clone())).await;
            metrics.active_workflows.dec(&[]);
            finished.store(true, Ordering::SeqCst);

            if let Err(err) = result {
                tracing::error!(thread_id = %thread_id, error = %err, "run failed to start or advance");
                let _ = tx.send(EngineEvent::RunFailed {
                    thread_id,
                    workflow_id,
                    error: err.to_string(),
                    ts: Utc::now(),
                });
            }
        });
    }

    let guard = DisconnectGuard {
        engine: state.engine.clone(),
        thread_id: thread_id.clone(),
        finished,
    };

    let stream = async_stream::stream! {
        // Moved into the generator so a client disconnect drops it.
        let _guard = guard;

        yield Ok(StreamEvent::new(
            "workflow_started",
            json!({"workflow_id": workflow_id, "thread_id": thread_id}),
        )
        .into_sse());

        while let Some(event) = rx.recv().await {
            record_node_metrics(&state, &event);

            let issue_url = match &event {
                EngineEvent::ApprovalRequested {
                    approval_request_id,
                    ..
                } => lookup_issue_url(&state, approval_request_id).await,
                _ => None,
            };

            if let Some(frame) = map_engine_event(&event, issue_url.as_deref()) {
                yield Ok(frame.into_sse());
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn record_node_metrics(state: &AppState, event: &EngineEvent) {
    match event {
        EngineEvent::NodeCompleted {
            node, duration_ms, ..
        } => {
            state
                .metrics
                .node_invocations_total
                .inc(&[node, "completed"]);
            state
                .metrics
                .node_duration_seconds
                .observe(&[node], *duration_ms as f64 / 1000.0);
        }
        EngineEvent::RunFailed { .. } => {
            state.metrics.node_invocations_total.inc(&["run", "failed"]);
        }
        _ => {}
    }
}

async fn lookup_issue_url(state: &AppState, request_id: &str) -> Option<String> {
    match state.manager.repository().get(request_id).await {
        Ok(Some(row)) => row.external_issue_url,
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(request_id, error = %err, "issue url lookup failed");
            None
        }
    }
}
