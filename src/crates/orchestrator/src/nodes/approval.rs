//! The approval gate node.
//!
//! First entry creates the approval request (mirrored to the tracker) and
//! interrupts the run; the checkpoint written right after is the resume
//! point. Re-entry after resume reads the decision and routes: approved
//! back to the requesting worker, rejected to the supervisor.

use crate::approval::ApprovalManager;
use async_trait::async_trait;
use std::sync::Arc;
use steward_core::{
    ApprovalStatus, EngineError, NodeContext, NodeHandler, NodeOutcome, Result, StateDelta,
    WorkflowState,
};

/// Node pausing the run for a human decision.
pub struct ApprovalNode {
    manager: Arc<ApprovalManager>,
}

impl ApprovalNode {
    /// Create the node.
    pub fn new(manager: Arc<ApprovalManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl NodeHandler for ApprovalNode {
    async fn run(&self, ctx: &NodeContext, state: &WorkflowState) -> Result<NodeOutcome> {
        match state.approval_status {
            // Resolution applied by resume; the conditional edge routes on
            // the decision.
            ApprovalStatus::Approved | ApprovalStatus::Rejected => {
                Ok(NodeOutcome::Advance(StateDelta::new()))
            }

            // A run re-entered an interrupted thread without a resolution:
            // re-emit the existing request instead of creating another.
            ApprovalStatus::Pending => {
                let request_id = state.approval_request_id.clone().ok_or_else(|| {
                    EngineError::Validation(
                        "pending approval without a request id".to_string(),
                    )
                })?;
                Ok(NodeOutcome::Interrupt {
                    approval_request_id: request_id,
                    delta: StateDelta::new(),
                })
            }

            _ => {
                let operation = state.pending_operation.clone().ok_or_else(|| {
                    EngineError::Validation(
                        "approval node entered without a pending operation".to_string(),
                    )
                })?;
                let agent = state
                    .pending_agent
                    .clone()
                    .unwrap_or_else(|| state.current_agent.clone());
                let pr_number = state
                    .project_context
                    .get("pr_number")
                    .and_then(|v| v.parse::<i64>().ok());

                let row = self
                    .manager
                    .create_request(
                        &ctx.workflow_id,
                        &ctx.thread_id,
                        ctx.checkpoint_seq,
                        &agent,
                        state.risk_level,
                        &operation,
                        pr_number,
                    )
                    .await
                    .map_err(|err| EngineError::NodeFailed {
                        node: "approval".to_string(),
                        error: err.to_string(),
                    })?;

                let delta = StateDelta::new()
                    .with_approval_status(ApprovalStatus::Pending)
                    .with_approval_request_id(row.request_id.clone());
                Ok(NodeOutcome::Interrupt {
                    approval_request_id: row.request_id,
                    delta,
                })
            }
        }
    }
}
