//! The conversational node.
//!
//! Ask-mode entry point: a single LLM turn with the conversational agent,
//! no tool loading, no routing and no side effects.

use crate::agents::AgentRuntime;
use async_trait::async_trait;
use std::sync::Arc;
use steward_core::{NodeContext, NodeHandler, NodeOutcome, Result, StateDelta, WorkflowState};

/// Node answering ask-mode turns directly.
pub struct ConversationalNode {
    runtime: Arc<AgentRuntime>,
}

impl ConversationalNode {
    /// Create the node.
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl NodeHandler for ConversationalNode {
    async fn run(&self, _ctx: &NodeContext, state: &WorkflowState) -> Result<NodeOutcome> {
        let turn = self.runtime.invoke_untooled("conversational", state).await?;

        let mut delta = StateDelta::new();
        delta.messages = turn.messages;
        Ok(NodeOutcome::Advance(delta))
    }
}
