//! The workflow execution engine.
//!
//! `Engine` drives a thread through the graph: load or initialise state,
//! invoke the current node, merge its delta, persist a checkpoint, then
//! follow the conditional edges until the `end` sentinel, an interrupt, a
//! failure or the hop limit. The per-thread advisory lock serialises
//! `run` and `resume`; the checkpoint sequence is monotone per thread.

use crate::error::{EngineError, Result};
use crate::events::{emit, EngineEvent, EventSender};
use crate::graph::{Graph, END};
use crate::messages::Message;
use crate::node::{NodeContext, NodeOutcome};
use crate::state::{ApprovalDecision, ApprovalStatus, RiskLevel, SessionMode, WorkflowState};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use steward_checkpoint::{Checkpoint, CheckpointStore};

use crate::lock::ThreadLocks;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum node transitions per run
    pub per_run_hop_limit: u32,

    /// How long `run`/`resume` wait for the thread's advisory lock
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            per_run_hop_limit: 25,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

/// Input for starting or continuing a run on a thread.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Thread to advance
    pub thread_id: String,
    /// Identifier for this run
    pub workflow_id: String,
    /// Interaction mode
    pub session_mode: SessionMode,
    /// New messages to append to the thread before running
    pub messages: Vec<Message>,
    /// Workspace metadata merged into the state
    pub project_context: BTreeMap<String, String>,
}

/// Token returned by approval resolution, consumed by [`Engine::resume`].
#[derive(Debug, Clone)]
pub struct ResumeTicket {
    /// Thread to resume
    pub thread_id: String,
    /// Checkpoint the approval was taken against; must still be the latest
    pub checkpoint_id: u64,
    /// The human's decision
    pub decision: ApprovalDecision,
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run reached `end`; the final state is returned.
    Completed(Box<WorkflowState>),

    /// The run paused awaiting an approval decision.
    Interrupted {
        /// Identifier of the approval request to wait on
        approval_request_id: String,
    },

    /// The run terminated with a failure; the failure is checkpointed.
    Failed {
        /// Human-readable failure description
        error: String,
    },

    /// The run was cancelled between node boundaries; the in-flight node's
    /// result was discarded and not checkpointed.
    Cancelled,
}

/// The compiled state machine plus its persistence and locking.
pub struct Engine {
    graph: Arc<Graph>,
    store: Arc<dyn CheckpointStore>,
    locks: ThreadLocks,
    cancel_flags: DashMap<String, Arc<AtomicBool>>,
    config: EngineConfig,
}

impl Engine {
    /// Create an engine over a graph and a checkpoint store.
    pub fn new(graph: Graph, store: Arc<dyn CheckpointStore>, config: EngineConfig) -> Self {
        Self {
            graph: Arc::new(graph),
            store,
            locks: ThreadLocks::new(),
            cancel_flags: DashMap::new(),
            config,
        }
    }

    /// The graph this engine executes.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Request cancellation of the thread's active run.
    ///
    /// Honoured between node boundaries; an in-flight node is not aborted
    /// but its result is discarded and no checkpoint is written.
    pub fn cancel(&self, thread_id: &str) {
        if let Some(flag) = self.cancel_flags.get(thread_id) {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Load the latest persisted state of a thread, if any.
    pub async fn latest_state(&self, thread_id: &str) -> Result<Option<(u64, WorkflowState)>> {
        match self.store.get_latest(thread_id).await? {
            Some(cp) => {
                let state = decode_state(&cp.state)?;
                Ok(Some((cp.checkpoint_id, state)))
            }
            None => Ok(None),
        }
    }

    /// Load the state at a specific checkpoint of a thread.
    pub async fn state_at(&self, thread_id: &str, checkpoint_id: u64) -> Result<WorkflowState> {
        let cp = self
            .store
            .get(thread_id, checkpoint_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("{thread_id}/{checkpoint_id}"))
            })?;
        decode_state(&cp.state)
    }

    /// Start or continue a run on a thread.
    pub async fn run(&self, request: RunRequest, events: Option<EventSender>) -> Result<RunOutcome> {
        let guard = self
            .locks
            .acquire(&request.thread_id, self.config.lock_timeout)
            .await?;

        let (mut state, seq) = match self.store.get_latest(&request.thread_id).await? {
            Some(cp) => (decode_state(&cp.state)?, cp.checkpoint_id),
            None => (
                WorkflowState::new(
                    request.thread_id.clone(),
                    request.workflow_id.clone(),
                    request.session_mode,
                ),
                0,
            ),
        };

        state.workflow_id = request.workflow_id.clone();
        state.session_mode = request.session_mode;
        state.messages.extend(request.messages);
        for (key, value) in request.project_context {
            state.project_context.insert(key, value);
        }

        // A thread whose previous run terminated starts a fresh run at the
        // entry point; one interrupted mid-run continues from its saved
        // next_agent (re-entering the approval node re-emits the pending
        // request idempotently).
        let start = if state.next_agent.is_empty() || state.next_agent == END {
            reset_for_new_run(&mut state);
            self.graph.entry_point(request.session_mode)?.to_string()
        } else {
            state.next_agent.clone()
        };

        let outcome = self
            .advance(&mut state, start, seq, events.as_ref())
            .await;
        drop(guard);
        outcome
    }

    /// Resume an interrupted thread after an approval decision.
    ///
    /// The ticket's checkpoint must still be the thread's latest; anything
    /// else is a stale resume and is rejected without side effects.
    pub async fn resume(
        &self,
        ticket: ResumeTicket,
        events: Option<EventSender>,
    ) -> Result<RunOutcome> {
        let guard = self
            .locks
            .acquire(&ticket.thread_id, self.config.lock_timeout)
            .await?;

        let latest = self
            .store
            .get_latest(&ticket.thread_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(ticket.thread_id.clone()))?;

        if latest.checkpoint_id != ticket.checkpoint_id {
            return Err(EngineError::StaleResume {
                thread_id: ticket.thread_id.clone(),
                ticket_checkpoint: ticket.checkpoint_id,
                latest_checkpoint: latest.checkpoint_id,
            });
        }

        let mut state = decode_state(&latest.state)?;
        state.approval_status = ticket.decision.into();
        state.requires_approval = false;
        state.pending_operation = None;
        state.approval_request_id = None;

        let seq = latest.checkpoint_id + 1;
        self.store
            .put(Checkpoint::new(
                ticket.thread_id.as_str(),
                seq,
                "resume",
                encode_state(&state)?,
            ))
            .await?;

        emit(
            events.as_ref(),
            EngineEvent::ApprovalResolved {
                thread_id: ticket.thread_id.clone(),
                workflow_id: state.workflow_id.clone(),
                decision: ticket.decision.as_str().to_string(),
                ts: Utc::now(),
            },
        );

        let start = state.next_agent.clone();
        let outcome = self.advance(&mut state, start, seq, events.as_ref()).await;
        drop(guard);
        outcome
    }

    /// The execution loop. Caller must hold the thread's advisory lock.
    async fn advance(
        &self,
        state: &mut WorkflowState,
        start: String,
        mut seq: u64,
        events: Option<&EventSender>,
    ) -> Result<RunOutcome> {
        let thread_id = state.thread_id.clone();
        let workflow_id = state.workflow_id.clone();

        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(thread_id.clone(), cancel.clone());

        let result = self
            .advance_inner(state, start, &mut seq, events, &cancel)
            .await;

        self.cancel_flags.remove(&thread_id);

        match &result {
            Ok(RunOutcome::Completed(_)) => emit(
                events,
                EngineEvent::RunCompleted {
                    thread_id,
                    workflow_id,
                    ts: Utc::now(),
                },
            ),
            Ok(RunOutcome::Failed { error }) => emit(
                events,
                EngineEvent::RunFailed {
                    thread_id,
                    workflow_id,
                    error: error.clone(),
                    ts: Utc::now(),
                },
            ),
            Ok(RunOutcome::Cancelled) => {
                tracing::info!(thread_id = %thread_id, "run cancelled between node boundaries");
            }
            _ => {}
        }

        result
    }

    async fn advance_inner(
        &self,
        state: &mut WorkflowState,
        start: String,
        seq: &mut u64,
        events: Option<&EventSender>,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome> {
        let thread_id = state.thread_id.clone();
        let workflow_id = state.workflow_id.clone();
        let mut node_name = start;
        let mut hops: u32 = 0;

        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(RunOutcome::Cancelled);
            }
            if hops >= self.config.per_run_hop_limit {
                let error = EngineError::HopLimitExceeded {
                    limit: self.config.per_run_hop_limit,
                }
                .to_string();
                tracing::warn!(thread_id = %thread_id, %error, "terminating run");
                return Ok(RunOutcome::Failed { error });
            }
            hops += 1;

            let handler = self
                .graph
                .node(&node_name)
                .ok_or_else(|| EngineError::UnknownNode(node_name.clone()))?
                .clone();

            emit(
                events,
                EngineEvent::NodeStarted {
                    thread_id: thread_id.clone(),
                    workflow_id: workflow_id.clone(),
                    node: node_name.clone(),
                    ts: Utc::now(),
                },
            );

            let ctx = NodeContext {
                thread_id: thread_id.clone(),
                workflow_id: workflow_id.clone(),
                checkpoint_seq: *seq + 1,
            };
            let started = Instant::now();
            let outcome = handler.run(&ctx, state).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            // A cancel that arrived while the node ran discards its result.
            if cancel.load(Ordering::SeqCst) {
                return Ok(RunOutcome::Cancelled);
            }

            match outcome {
                Err(err) => {
                    tracing::error!(
                        thread_id = %thread_id,
                        node = %node_name,
                        error = %err,
                        "node failed; checkpointing failure state"
                    );
                    state.current_agent = node_name.clone();
                    state.next_agent = END.to_string();
                    state.task_result.insert(
                        "error".to_string(),
                        json!({"node": node_name, "message": err.to_string()}),
                    );
                    *seq += 1;
                    self.store
                        .put(Checkpoint::new(
                            thread_id.as_str(),
                            *seq,
                            &node_name,
                            encode_state(state)?,
                        ))
                        .await?;
                    return Ok(RunOutcome::Failed {
                        error: err.to_string(),
                    });
                }
                Ok(NodeOutcome::Advance(delta)) => {
                    let appended = assistant_contents(&delta.messages);
                    state.apply(delta);
                    state.current_agent = node_name.clone();

                    let next = self.graph.next_node(&node_name, state)?;
                    state.next_agent = next.clone();
                    state.validate(self.graph.node_names())?;

                    *seq += 1;
                    self.store
                        .put(Checkpoint::new(
                            thread_id.as_str(),
                            *seq,
                            &node_name,
                            encode_state(state)?,
                        ))
                        .await?;

                    for content in appended {
                        emit(
                            events,
                            EngineEvent::AgentMessage {
                                thread_id: thread_id.clone(),
                                workflow_id: workflow_id.clone(),
                                node: node_name.clone(),
                                content,
                                ts: Utc::now(),
                            },
                        );
                    }
                    emit(
                        events,
                        EngineEvent::NodeCompleted {
                            thread_id: thread_id.clone(),
                            workflow_id: workflow_id.clone(),
                            node: node_name.clone(),
                            duration_ms,
                            ts: Utc::now(),
                        },
                    );

                    if next == END {
                        return Ok(RunOutcome::Completed(Box::new(state.clone())));
                    }
                    node_name = next;
                }
                Ok(NodeOutcome::Interrupt {
                    approval_request_id,
                    delta,
                }) => {
                    state.apply(delta);
                    state.current_agent = node_name.clone();
                    // The interrupted node is re-entered on resume.
                    state.next_agent = node_name.clone();
                    state.validate(self.graph.node_names())?;

                    *seq += 1;
                    self.store
                        .put(Checkpoint::new(
                            thread_id.as_str(),
                            *seq,
                            &node_name,
                            encode_state(state)?,
                        ))
                        .await?;

                    emit(
                        events,
                        EngineEvent::NodeCompleted {
                            thread_id: thread_id.clone(),
                            workflow_id: workflow_id.clone(),
                            node: node_name.clone(),
                            duration_ms,
                            ts: Utc::now(),
                        },
                    );
                    emit(
                        events,
                        EngineEvent::ApprovalRequested {
                            thread_id: thread_id.clone(),
                            workflow_id: workflow_id.clone(),
                            node: node_name.clone(),
                            approval_request_id: approval_request_id.clone(),
                            ts: Utc::now(),
                        },
                    );

                    return Ok(RunOutcome::Interrupted {
                        approval_request_id,
                    });
                }
            }
        }
    }
}

/// Reset per-run fields when a terminated thread starts a new run.
///
/// Conversation history, insights and project context persist across runs;
/// routing and terminal approval bookkeeping do not. A pending approval is
/// left untouched so the new run re-enters the approval node.
fn reset_for_new_run(state: &mut WorkflowState) {
    state.current_agent = String::new();
    state.next_agent = String::new();
    state.routing_decision = None;
    state.task_result.clear();
    if state.approval_status != ApprovalStatus::Pending {
        state.approval_status = ApprovalStatus::None;
        state.approval_request_id = None;
        state.pending_agent = None;
        state.pending_operation = None;
        state.requires_approval = false;
        state.risk_level = RiskLevel::Low;
    }
}

fn encode_state(state: &WorkflowState) -> Result<serde_json::Value> {
    serde_json::to_value(state).map_err(EngineError::from)
}

fn decode_state(value: &serde_json::Value) -> Result<WorkflowState> {
    serde_json::from_value(value.clone()).map_err(EngineError::from)
}

fn assistant_contents(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.is_assistant() && !m.content().is_empty())
        .map(|m| m.content().to_string())
        .collect()
}
