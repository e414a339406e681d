//! End-to-end scenarios over the assembled stack: a scripted chat model,
//! a fake tracker, an in-memory SQLite store and the real graph, engine,
//! approval manager and webhook handler.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use orchestrator::agents::{AgentRegistry, AgentRuntime, ToolExecutorRegistry};
use orchestrator::api::webhook::sign_body;
use orchestrator::api::{create_router, AppState};
use orchestrator::approval::{ApprovalManager, IssueTracker, ResolveOutcome, TrackerIssue};
use orchestrator::db::{ApprovalRepository, DatabaseConnection, SqliteCheckpointStore};
use orchestrator::graph::build_graph;
use orchestrator::metrics::Metrics;
use orchestrator::risk::RiskAssessor;
use orchestrator::router::{IntentRouter, IntentKind};
use orchestrator::tools::{StaticToolDiscovery, ToolCatalog};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use steward_core::llm::{ChatModel, ChatRequest, ChatResponse};
use steward_core::{
    ApprovalDecision, Engine, EngineConfig, EngineEvent, Message, Result as EngineResult,
    RunOutcome, RunRequest, SessionMode, ToolCall,
};
use steward_checkpoint::{Checkpoint, CheckpointStore};
use tower::util::ServiceExt;

/// Scripted model: answers calls from a canned list, then falls back.
struct ScriptedModel {
    responses: Mutex<Vec<Message>>,
}

impl ScriptedModel {
    fn new(mut responses: Vec<Message>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, _request: ChatRequest) -> EngineResult<ChatResponse> {
        let message = self
            .responses
            .lock()
            .pop()
            .unwrap_or_else(|| Message::assistant("done"));
        Ok(ChatResponse {
            message,
            usage: None,
        })
    }
}

struct FakeTracker {
    issues: Mutex<Vec<TrackerIssue>>,
}

impl FakeTracker {
    fn new() -> Self {
        Self {
            issues: Mutex::new(Vec::new()),
        }
    }

    fn issue_count(&self) -> usize {
        self.issues.lock().len()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn create_issue(
        &self,
        _title: &str,
        _description: &str,
        _priority: u8,
    ) -> orchestrator::Result<TrackerIssue> {
        let mut issues = self.issues.lock();
        let issue = TrackerIssue {
            id: format!("ISS-{}", issues.len() + 1),
            url: format!("https://tracker/ISS-{}", issues.len() + 1),
        };
        issues.push(TrackerIssue {
            id: issue.id.clone(),
            url: issue.url.clone(),
        });
        Ok(issue)
    }

    async fn close_issue(&self, _issue_id: &str) -> orchestrator::Result<()> {
        Ok(())
    }

    async fn comment_on_pr(&self, _pr_number: i64, _body: &str) -> orchestrator::Result<()> {
        Ok(())
    }

    async fn issue_state(&self, _issue_id: &str) -> orchestrator::Result<String> {
        Ok("Todo".to_string())
    }
}

struct Stack {
    engine: Arc<Engine>,
    manager: Arc<ApprovalManager>,
    metrics: Arc<Metrics>,
    store: SqliteCheckpointStore,
    tracker: Arc<FakeTracker>,
    runtime: Arc<AgentRuntime>,
    db: DatabaseConnection,
    model: Arc<ScriptedModel>,
}

async fn stack(responses: Vec<Message>) -> Stack {
    stack_with_hop_limit(responses, 8).await
}

async fn stack_with_hop_limit(responses: Vec<Message>, hop_limit: u32) -> Stack {
    let db = DatabaseConnection::connect("sqlite::memory:", 1).await.unwrap();
    db.run_migrations().await.unwrap();

    let metrics = Arc::new(Metrics::new());
    let tracker = Arc::new(FakeTracker::new());
    let model = Arc::new(ScriptedModel::new(responses));
    let catalog = Arc::new(ToolCatalog::new(
        Arc::new(StaticToolDiscovery::builtin()),
        Duration::from_secs(300),
    ));

    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(AgentRegistry::defaults()),
        catalog,
        model.clone(),
        Arc::new(ToolExecutorRegistry::new()),
        metrics.clone(),
        HashMap::new(),
        HashMap::new(),
        60,
        hop_limit,
        "scripted".to_string(),
    ));

    let manager = Arc::new(ApprovalManager::new(
        ApprovalRepository::new(db.clone()),
        tracker.clone(),
        metrics.clone(),
    ));

    let store = SqliteCheckpointStore::new(db.clone());
    let graph = build_graph(
        runtime.clone(),
        manager.clone(),
        Arc::new(RiskAssessor::builtin()),
    )
    .unwrap();
    let engine = Arc::new(Engine::new(
        graph,
        Arc::new(store.clone()),
        EngineConfig::default(),
    ));

    Stack {
        engine,
        manager,
        metrics,
        store,
        tracker,
        runtime,
        db,
        model,
    }
}

fn app_state(stack: &Stack, secret: Option<&str>) -> AppState {
    AppState {
        engine: stack.engine.clone(),
        runtime: stack.runtime.clone(),
        intent: Arc::new(IntentRouter::new()),
        manager: stack.manager.clone(),
        tracker: stack.tracker.clone(),
        metrics: stack.metrics.clone(),
        db: stack.db.clone(),
        model: stack.model.clone(),
        webhook_secret: secret.map(|s| s.to_string()),
        approved_states: Arc::new(vec!["Done".to_string()]),
        rejected_states: Arc::new(vec!["Canceled".to_string()]),
    }
}

/// POST a JSON body and return the response.
async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::http::Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Collect an SSE body and return (event names in order, full text).
async fn read_sse(response: axum::http::Response<Body>) -> (Vec<String>, String) {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let kinds = text
        .lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .map(|name| name.trim().to_string())
        .collect();
    (kinds, text)
}

async fn checkpoint_count(stack: &Stack) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkpoints")
        .fetch_one(stack.db.pool())
        .await
        .unwrap();
    count
}

fn run_request(thread: &str, workflow: &str, task: &str) -> RunRequest {
    RunRequest {
        thread_id: thread.to_string(),
        workflow_id: workflow.to_string(),
        session_mode: SessionMode::Agent,
        messages: vec![Message::user(task)],
        project_context: BTreeMap::new(),
    }
}

fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<EngineEvent>) -> Vec<String> {
    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(match event {
            EngineEvent::NodeStarted { node, .. } => format!("node_started:{node}"),
            EngineEvent::NodeCompleted { node, .. } => format!("node_completed:{node}"),
            EngineEvent::AgentMessage { node, .. } => format!("content:{node}"),
            EngineEvent::ApprovalRequested { .. } => "approval_requested".to_string(),
            EngineEvent::ApprovalResolved { decision, .. } => {
                format!("approval_resolved:{decision}")
            }
            EngineEvent::RunCompleted { .. } => "run_completed".to_string(),
            EngineEvent::RunFailed { .. } => "run_failed".to_string(),
        });
    }
    kinds
}

// Scenario A: a conversational question through POST /chat/stream yields
// content* then done, invokes no worker agent and writes no checkpoint.
#[tokio::test]
async fn scenario_a_conversational_bypass() {
    let stack = stack(vec![Message::assistant(
        "I can help with engineering tasks across your workspace.",
    )])
    .await;
    let app = create_router(app_state(&stack, None));

    let intent = IntentRouter::new().classify("what can you do?", SessionMode::Ask);
    assert_eq!(intent.kind, IntentKind::GeneralQuery);

    let response = post_json(
        &app,
        "/chat/stream",
        json!({"message": "what can you do?", "session_id": "chat-1"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (kinds, text) = read_sse(response).await;
    assert!(kinds.len() >= 2, "expected content* then done, got {kinds:?}");
    let (last, contents) = kinds.split_last().unwrap();
    assert_eq!(last, "done");
    assert!(contents.iter().all(|k| k == "content"), "got {kinds:?}");
    assert!(text.contains("I can help"));

    // No agent routing happened and nothing was checkpointed.
    assert!(stack.store.get_latest("chat-1").await.unwrap().is_none());
    assert_eq!(checkpoint_count(&stack).await, 0);
}

// Scenario B: an explicit /execute command on /chat/stream produces a
// single redirect event pointing at the execute endpoint, then closes.
#[tokio::test]
async fn scenario_b_execute_command_redirect() {
    let stack = stack(Vec::new()).await;
    let app = create_router(app_state(&stack, None));

    let response = post_json(
        &app,
        "/chat/stream",
        json!({"message": "/execute add retries to login"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let (kinds, text) = read_sse(response).await;
    assert_eq!(kinds, vec!["redirect"]);
    assert!(text.contains(r#""endpoint":"/execute/stream""#));
    assert!(text.contains(r#""task":"add retries to login""#));

    // The redirect never starts a run: no agent invoked, no checkpoint.
    assert_eq!(checkpoint_count(&stack).await, 0);
}

// Scenario C: a low-risk task runs supervisor -> documentation -> end with
// at least two checkpoints and no approval row.
#[tokio::test]
async fn scenario_c_low_risk_completion() {
    let stack = stack(vec![Message::assistant("README updated with the new env var.")]).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let outcome = stack
        .engine
        .run(
            run_request("t-docs", "wf-1", "update README with new env var"),
            Some(tx),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    let kinds = drain(&mut rx);
    assert_eq!(
        kinds,
        vec![
            "node_started:supervisor",
            "node_completed:supervisor",
            "node_started:documentation",
            "content:documentation",
            "node_completed:documentation",
            "run_completed",
        ]
    );

    let checkpoints = stack.store.list("t-docs").await.unwrap();
    assert!(checkpoints.len() >= 2);
    let ids: Vec<u64> = checkpoints.iter().map(|c| c.checkpoint_id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted, "checkpoint ids are strictly increasing");

    assert_eq!(stack.tracker.issue_count(), 0);
    assert!(stack
        .manager
        .repository()
        .pending()
        .await
        .unwrap()
        .is_empty());
}

// Scenario D: a production deploy interrupts for approval, mirrors to the
// tracker with the PR number, and resumes to completion after approval.
#[tokio::test]
async fn scenario_d_high_risk_interrupt_and_approve() {
    let stack = stack(vec![Message::assistant("Deployment of v2.5 completed.")]).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut request = run_request("t-deploy", "wf-1", "deploy v2.5 to production");
    request
        .project_context
        .insert("pr_number".to_string(), "142".to_string());

    let outcome = stack.engine.run(request, Some(tx)).await.unwrap();
    let request_id = match outcome {
        RunOutcome::Interrupted {
            approval_request_id,
        } => approval_request_id,
        other => panic!("expected interrupt, got {other:?}"),
    };

    let kinds = drain(&mut rx);
    assert_eq!(
        kinds,
        vec![
            "node_started:supervisor",
            "node_completed:supervisor",
            "node_started:infrastructure",
            "node_completed:infrastructure",
            "node_started:approval",
            "node_completed:approval",
            "approval_requested",
        ]
    );

    // Side effects: a pending row linked to the tracker issue and the PR.
    let row = stack
        .manager
        .repository()
        .get(&request_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "pending");
    assert_eq!(row.risk_level, "critical");
    assert_eq!(row.pr_number, Some(142));
    assert_eq!(row.external_issue_id.as_deref(), Some("ISS-1"));
    assert_eq!(stack.tracker.issue_count(), 1);

    // The approval checkpoint is the thread's latest.
    let latest = stack.store.get_latest("t-deploy").await.unwrap().unwrap();
    assert_eq!(latest.checkpoint_id, row.checkpoint_id as u64);

    // Approve via the resolution path the webhook uses.
    let outcome = stack
        .manager
        .resolve("ISS-1", ApprovalDecision::Approved, "alice", None)
        .await
        .unwrap();
    let ticket = match outcome {
        ResolveOutcome::Resolved { ticket, .. } => ticket,
        other => panic!("expected resolution, got {other:?}"),
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let outcome = stack.engine.resume(ticket, Some(tx)).await.unwrap();
    let state = match outcome {
        RunOutcome::Completed(state) => state,
        other => panic!("expected completion, got {other:?}"),
    };

    let kinds = drain(&mut rx);
    assert_eq!(kinds[0], "approval_resolved:approved");
    assert!(kinds.contains(&"content:infrastructure".to_string()));
    assert_eq!(kinds.last().unwrap(), "run_completed");

    assert!(state
        .messages
        .iter()
        .any(|m| m.content().contains("Deployment of v2.5 completed")));

    let row = stack
        .manager
        .repository()
        .find_by_issue("ISS-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "approved");
}

// Scenario D (rejection branch): the supervisor closes the run with an
// explanation and the operation is never performed.
#[tokio::test]
async fn scenario_d_rejection_ends_run() {
    let stack = stack(Vec::new()).await;

    let outcome = stack
        .engine
        .run(
            run_request("t-deploy", "wf-1", "deploy v2.5 to production"),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));

    let outcome = stack
        .manager
        .resolve("ISS-1", ApprovalDecision::Rejected, "bob", Some("not today"))
        .await
        .unwrap();
    let ticket = match outcome {
        ResolveOutcome::Resolved { ticket, .. } => ticket,
        other => panic!("expected resolution, got {other:?}"),
    };

    let outcome = stack.engine.resume(ticket, None).await.unwrap();
    let state = match outcome {
        RunOutcome::Completed(state) => state,
        other => panic!("expected completion, got {other:?}"),
    };

    assert!(state
        .messages
        .iter()
        .any(|m| m.content().contains("rejected")));
    assert_eq!(
        state.approval_status,
        steward_core::ApprovalStatus::None
    );
}

// Scenario F: a resume ticket referencing a superseded checkpoint is
// rejected without touching the terminal row.
#[tokio::test]
async fn scenario_f_stale_resume_rejected() {
    let stack = stack(Vec::new()).await;

    let outcome = stack
        .engine
        .run(
            run_request("t-deploy", "wf-1", "deploy v2.5 to production"),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));

    let ticket = match stack
        .manager
        .resolve("ISS-1", ApprovalDecision::Approved, "alice", None)
        .await
        .unwrap()
    {
        ResolveOutcome::Resolved { ticket, .. } => ticket,
        other => panic!("expected resolution, got {other:?}"),
    };

    // An operator manually advances the thread past the approval
    // checkpoint before the resume lands.
    let latest = stack.store.get_latest("t-deploy").await.unwrap().unwrap();
    stack
        .store
        .put(Checkpoint::new(
            "t-deploy",
            latest.checkpoint_id + 1,
            "manual",
            latest.state.clone(),
        ))
        .await
        .unwrap();

    let err = stack.engine.resume(ticket, None).await.unwrap_err();
    assert!(matches!(
        err,
        steward_core::EngineError::StaleResume { .. }
    ));

    // The row stays terminal; no double resolution happened.
    let row = stack
        .manager
        .repository()
        .find_by_issue("ISS-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "approved");
    assert_eq!(row.resolver.as_deref(), Some("alice"));
}

// Webhook layer: signatures, idempotent duplicate delivery, malformed
// payloads (Scenarios D webhook leg + E).
#[tokio::test]
async fn scenario_e_webhook_idempotency_and_auth() {
    let stack = stack(vec![Message::assistant("Deployment completed.")]).await;
    let secret = "shared-secret";
    let app = create_router(app_state(&stack, Some(secret)));

    // Interrupt a deploy so ISS-1 exists.
    let outcome = stack
        .engine
        .run(
            run_request("t-deploy", "wf-1", "deploy v2.5 to production"),
            None,
        )
        .await
        .unwrap();
    assert!(matches!(outcome, RunOutcome::Interrupted { .. }));

    let body = json!({"issue_id": "ISS-1", "state": "Done", "resolver": "alice"}).to_string();
    let signature = sign_body(secret, body.as_bytes());

    let request = |sig: Option<&str>, body: &str| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhooks/approval")
            .header("content-type", "application/json");
        if let Some(sig) = sig {
            builder = builder.header("x-webhook-signature", sig);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    };

    // Unsigned delivery is rejected with no side effects.
    let response = app
        .clone()
        .oneshot(request(None, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Malformed (but signed) payload is a 400.
    let bad_body = r#"{"unexpected": true}"#;
    let bad_sig = sign_body(secret, bad_body.as_bytes());
    let response = app
        .clone()
        .oneshot(request(Some(&bad_sig), bad_body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // First signed delivery resolves the row.
    let response = app
        .clone()
        .oneshot(request(Some(&signature), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Give the async resume a moment to finish.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let row = stack
        .manager
        .repository()
        .find_by_issue("ISS-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, "approved");

    // Second delivery: 202, no state change, duplicate counter bumped.
    let response = app
        .clone()
        .oneshot(request(Some(&signature), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(stack.metrics.webhook_duplicate_total.get(&[]), 1);

    let row = stack
        .manager
        .repository()
        .find_by_issue("ISS-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.resolver.as_deref(), Some("alice"));
    assert_eq!(row.status, "approved");
}

// A worker that exhausts its per-invocation hop limit must be observably
// different from a clean completion: the supervisor appends a warning the
// client sees as a content event.
#[tokio::test]
async fn incomplete_worker_turn_is_reported() {
    // Every scripted response demands another tool round, so a limit of 1
    // guarantees the worker comes back unfinished.
    let looping: Vec<Message> = (0..3)
        .map(|i| {
            Message::assistant_with_tools(
                "",
                vec![ToolCall::new(format!("call_{i}"), "file_read", json!({}))],
            )
        })
        .collect();
    let stack = stack_with_hop_limit(looping, 1).await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let outcome = stack
        .engine
        .run(
            run_request("t-stuck", "wf-1", "add retries to the login endpoint"),
            Some(tx),
        )
        .await
        .unwrap();

    let state = match outcome {
        RunOutcome::Completed(state) => state,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(
        state.task_result["feature_dev"]["status"],
        json!("incomplete")
    );
    assert!(state
        .messages
        .iter()
        .any(|m| m.content().contains("stopped before finishing")));

    // The warning reaches the stream as supervisor content; a clean run
    // (scenario C) emits no such message.
    let kinds = drain(&mut rx);
    assert!(kinds.contains(&"content:supervisor".to_string()), "got {kinds:?}");
}

// Re-entering an interrupted thread re-emits the same approval request
// instead of creating a duplicate.
#[tokio::test]
async fn reentry_of_interrupted_thread_is_idempotent() {
    let stack = stack(Vec::new()).await;

    let first = stack
        .engine
        .run(
            run_request("t-deploy", "wf-1", "deploy v2.5 to production"),
            None,
        )
        .await
        .unwrap();
    let first_id = match first {
        RunOutcome::Interrupted {
            approval_request_id,
        } => approval_request_id,
        other => panic!("expected interrupt, got {other:?}"),
    };

    let second = stack
        .engine
        .run(
            run_request("t-deploy", "wf-2", "any update?"),
            None,
        )
        .await
        .unwrap();
    let second_id = match second {
        RunOutcome::Interrupted {
            approval_request_id,
        } => approval_request_id,
        other => panic!("expected interrupt, got {other:?}"),
    };

    assert_eq!(first_id, second_id);
    assert_eq!(stack.tracker.issue_count(), 1);
}
