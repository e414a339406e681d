//! Node execution outcomes and the handler trait.
//!
//! A node returns either `Advance` with a state delta, or `Interrupt` to
//! pause the run for an external approval. The interrupt is an ordinary
//! return value: the engine treats it as a clean exit after checkpointing,
//! and the checkpoint is the saved state.

use crate::error::Result;
use crate::state::{StateDelta, WorkflowState};
use async_trait::async_trait;

/// Execution context handed to a node.
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Thread the run belongs to
    pub thread_id: String,

    /// Identifier of the current run
    pub workflow_id: String,

    /// Sequence number the checkpoint written after this node will carry.
    ///
    /// Approval nodes record this so a resume ticket can be validated
    /// against the latest checkpoint.
    pub checkpoint_seq: u64,
}

/// Result a node returns to the engine.
#[derive(Debug, Clone)]
pub enum NodeOutcome {
    /// Merge the delta and continue along the graph's edges.
    Advance(StateDelta),

    /// Merge the delta, checkpoint, and stop the run awaiting approval.
    Interrupt {
        /// Identifier of the approval request to wait on
        approval_request_id: String,
        /// Approval bookkeeping to merge before checkpointing
        delta: StateDelta,
    },
}

impl NodeOutcome {
    /// Shorthand for an `Advance` with just appended messages.
    pub fn advance(delta: StateDelta) -> Self {
        NodeOutcome::Advance(delta)
    }
}

/// A graph vertex: the unit of execution the engine schedules.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Execute the node against the current state.
    ///
    /// Handlers must treat `state` as read-only and express every change
    /// through the returned delta; the engine owns the merge.
    async fn run(&self, ctx: &NodeContext, state: &WorkflowState) -> Result<NodeOutcome>;
}
