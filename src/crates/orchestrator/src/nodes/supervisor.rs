//! The supervisor node.
//!
//! Routes each request to the worker agent whose domain matches it, using
//! an ordered keyword table with a feature-development fallback. Also the
//! return point after a rejected approval, where it closes the run with an
//! explanation.

use async_trait::async_trait;
use steward_core::{
    ApprovalStatus, Message, NodeContext, NodeHandler, NodeOutcome, Result, RoutingDecision,
    StateDelta, WorkflowState, END,
};

/// Keyword routes, evaluated in order; first match wins.
const ROUTES: &[(&str, &[&str])] = &[
    (
        "infrastructure",
        &[
            "deploy", "deployment", "infra", "infrastructure", "terraform", "kubernetes", "k8s",
            "provision", "rollback", "docker",
        ],
    ),
    ("cicd", &["pipeline", "ci", "cd", "release", "workflow"]),
    ("code_review", &["review", "lint", "quality"]),
    (
        "documentation",
        &["readme", "docs", "documentation", "changelog", "document"],
    ),
];

/// Fallback agent when no keyword matches.
const DEFAULT_AGENT: &str = "feature_dev";

/// Node choosing the next worker.
#[derive(Default)]
pub struct SupervisorNode;

impl SupervisorNode {
    /// Create the node.
    pub fn new() -> Self {
        Self
    }

    fn route(task: &str) -> RoutingDecision {
        let tokens: Vec<String> = task
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect();

        for (agent, keywords) in ROUTES {
            if let Some(hit) = keywords.iter().find(|k| tokens.iter().any(|t| t == *k)) {
                return RoutingDecision {
                    agent: agent.to_string(),
                    reasoning: format!("matched keyword '{hit}'"),
                    confidence: 0.9,
                };
            }
        }

        RoutingDecision {
            agent: DEFAULT_AGENT.to_string(),
            reasoning: "no domain keyword matched".to_string(),
            confidence: 0.5,
        }
    }
}

#[async_trait]
impl NodeHandler for SupervisorNode {
    async fn run(&self, _ctx: &NodeContext, state: &WorkflowState) -> Result<NodeOutcome> {
        // Return path after a rejected approval: explain and finish.
        if state.approval_status == ApprovalStatus::Rejected {
            let delta = StateDelta::new()
                .with_message(Message::assistant(
                    "The requested operation was rejected during approval and will not \
                     be performed.",
                ))
                .with_approval_status(ApprovalStatus::None)
                .clear_pending_agent()
                .with_next_agent(END);
            return Ok(NodeOutcome::Advance(delta));
        }

        // A worker came back without finishing (its per-invocation tool
        // loop hit the hop limit). Tell the user instead of reporting a
        // clean completion.
        if let Some((agent, _)) = state
            .task_result
            .iter()
            .find(|(_, result)| result.get("status").and_then(|s| s.as_str()) == Some("incomplete"))
        {
            let delta = StateDelta::new()
                .with_message(Message::assistant(format!(
                    "The {agent} agent stopped before finishing: it reached its \
                     tool-call limit for a single invocation. The result may be \
                     partial; review it or resubmit a narrower request.",
                )))
                .with_next_agent(END);
            return Ok(NodeOutcome::Advance(delta));
        }

        // A worker already reported back this run; nothing left to route.
        if !state.task_result.is_empty() {
            return Ok(NodeOutcome::Advance(StateDelta::new().with_next_agent(END)));
        }

        let task = steward_core::messages::last_user_content(&state.messages).unwrap_or_default();
        let decision = Self::route(task);
        tracing::info!(
            agent = %decision.agent,
            confidence = decision.confidence,
            "supervisor routed task"
        );

        let delta = StateDelta::new()
            .with_next_agent(decision.agent.clone())
            .with_routing_decision(decision);
        Ok(NodeOutcome::Advance(delta))
    }
}
