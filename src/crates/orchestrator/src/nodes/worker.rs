//! Worker nodes.
//!
//! One generic handler parameterised by agent name covers every worker.
//! A worker first checks whether the task implies a gated operation; if
//! the risk rules demand approval it hands off to the approval node,
//! otherwise it runs its agent turn and declares completion.

use crate::agents::AgentRuntime;
use crate::risk::RiskAssessor;
use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use steward_core::messages::last_user_content;
use steward_core::{
    ApprovalStatus, NodeContext, NodeHandler, NodeOutcome, PendingOperation, Result, StateDelta,
    WorkflowState,
};

/// Extract a gated operation from a task description, if it names one.
///
/// The parse is intentionally coarse: it only needs to recognise the
/// operation kinds the risk rules gate on. Everything else is ordinary
/// agent work.
pub fn detect_operation(task: &str) -> Option<PendingOperation> {
    let lowered = task.to_lowercase();

    let kind = if lowered.contains("terraform") {
        "terraform_apply"
    } else if lowered.contains("compose up") || lowered.contains("docker compose") {
        "compose_up"
    } else if lowered.contains("kubectl") || lowered.contains("k8s") {
        "k8s_apply"
    } else if lowered.contains("migrat") {
        "db_migrate"
    } else if lowered.contains("deploy") {
        "deploy"
    } else if lowered.contains("readme") || lowered.contains("docs") {
        "update_docs"
    } else {
        return None;
    };

    let environment = if lowered.contains("production") || lowered.contains("prod") {
        "production"
    } else if lowered.contains("staging") {
        "staging"
    } else {
        "dev"
    };

    // A version-ish token makes the most useful target; fall back to the
    // whole task.
    let version = Regex::new(r"v\d[\w.\-]*").ok().and_then(|re| {
        re.find(&lowered).map(|m| m.as_str().to_string())
    });
    let target = version.unwrap_or_else(|| task.trim().to_string());

    Some(PendingOperation {
        kind: kind.to_string(),
        target,
        params: json!({}),
        environment: environment.to_string(),
    })
}

/// Generic worker node.
pub struct WorkerNode {
    agent_name: String,
    runtime: Arc<AgentRuntime>,
    risk: Arc<RiskAssessor>,
}

impl WorkerNode {
    /// Create a worker for the named agent.
    pub fn new(agent_name: impl Into<String>, runtime: Arc<AgentRuntime>, risk: Arc<RiskAssessor>) -> Self {
        Self {
            agent_name: agent_name.into(),
            runtime,
            risk,
        }
    }

    async fn run_turn(&self, state: &WorkflowState, clearing_approval: bool) -> Result<StateDelta> {
        let turn = self.runtime.invoke(&self.agent_name, state).await?;

        let status = if turn.hop_limit_reached {
            json!({"status": "incomplete", "hop_limit_reached": true})
        } else {
            json!({"status": "complete"})
        };

        let mut delta = StateDelta::new().with_task_result(self.agent_name.clone(), status);
        delta.messages = turn.messages;
        if clearing_approval {
            delta = delta
                .with_approval_status(ApprovalStatus::None)
                .clear_pending_agent();
        }
        Ok(delta)
    }
}

#[async_trait]
impl NodeHandler for WorkerNode {
    async fn run(&self, _ctx: &NodeContext, state: &WorkflowState) -> Result<NodeOutcome> {
        // Re-entry after an approved operation: proceed and clear the
        // approval bookkeeping.
        let approved_for_me = state.approval_status == ApprovalStatus::Approved
            && state.pending_agent.as_deref() == Some(self.agent_name.as_str());
        if approved_for_me {
            let delta = self.run_turn(state, true).await?;
            return Ok(NodeOutcome::Advance(delta));
        }

        // Fresh entry: gate on risk before doing any work.
        if !state.requires_approval {
            if let Some(operation) = detect_operation(last_user_content(&state.messages).unwrap_or_default()) {
                let assessment = self.risk.assess(&operation);
                if assessment.requires_approval {
                    tracing::info!(
                        agent = %self.agent_name,
                        kind = %operation.kind,
                        risk = assessment.risk_level.as_str(),
                        "operation requires approval"
                    );
                    let delta = StateDelta::new()
                        .with_pending_operation(operation)
                        .with_requires_approval(true)
                        .with_risk_level(assessment.risk_level)
                        .with_pending_agent(self.agent_name.clone());
                    return Ok(NodeOutcome::Advance(delta));
                }
            }
        }

        let delta = self.run_turn(state, false).await?;
        Ok(NodeOutcome::Advance(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::RiskLevel;

    #[test]
    fn test_detect_prod_deploy() {
        let op = detect_operation("deploy v2.5 to production").unwrap();
        assert_eq!(op.kind, "deploy");
        assert_eq!(op.environment, "production");
        assert_eq!(op.target, "v2.5");
    }

    #[test]
    fn test_detect_staging_terraform() {
        let op = detect_operation("run terraform apply against staging").unwrap();
        assert_eq!(op.kind, "terraform_apply");
        assert_eq!(op.environment, "staging");
    }

    #[test]
    fn test_detect_migration_defaults_to_dev() {
        let op = detect_operation("migrate the users table").unwrap();
        assert_eq!(op.kind, "db_migrate");
        assert_eq!(op.environment, "dev");
    }

    #[test]
    fn test_detect_docs() {
        let op = detect_operation("update README with new env var").unwrap();
        assert_eq!(op.kind, "update_docs");
    }

    #[test]
    fn test_plain_task_has_no_operation() {
        assert!(detect_operation("add retries to the login endpoint").is_none());
    }

    #[test]
    fn test_docs_op_is_not_gated() {
        let assessor = RiskAssessor::builtin();
        let op = detect_operation("update README with new env var").unwrap();
        let assessment = assessor.assess(&op);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert!(!assessment.requires_approval);
    }
}
