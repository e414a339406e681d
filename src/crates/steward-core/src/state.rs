//! Workflow state transported between graph nodes.

use crate::error::{EngineError, Result};
use crate::graph::END;
use crate::messages::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Session interaction mode, set by the caller per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Conversational: questions only, no side effects.
    #[default]
    Ask,
    /// Task-executing: the supervisor routes work to agents.
    Agent,
}

/// Risk classification of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine change, no approval needed
    #[default]
    Low,
    /// Reviewable change
    Medium,
    /// Approval required
    High,
    /// Approval required, highest tracker priority
    Critical,
}

impl RiskLevel {
    /// Stable string form used in metric labels and tracker payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Lifecycle of an approval attached to a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// No approval in flight
    #[default]
    None,
    /// Waiting on a human decision
    Pending,
    /// Approved by a resolver
    Approved,
    /// Rejected by a resolver
    Rejected,
    /// Timed out before resolution
    Expired,
}

impl ApprovalStatus {
    /// Stable string form used in metric labels and persisted rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::None => "none",
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
        }
    }
}

/// Terminal decision a resolver can make on a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    /// Proceed with the pending operation
    Approved,
    /// Abandon the pending operation
    Rejected,
}

impl From<ApprovalDecision> for ApprovalStatus {
    fn from(decision: ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Approved => ApprovalStatus::Approved,
            ApprovalDecision::Rejected => ApprovalStatus::Rejected,
        }
    }
}

impl ApprovalDecision {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approved => "approved",
            ApprovalDecision::Rejected => "rejected",
        }
    }
}

/// The supervisor's routing choice for the current turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Agent the supervisor selected
    pub agent: String,
    /// Short rationale for the choice
    pub reasoning: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Description of an operation awaiting approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Operation kind (e.g. `deploy`, `terraform_apply`, `db_migrate`)
    pub kind: String,
    /// What the operation acts on
    pub target: String,
    /// Structured operation parameters
    #[serde(default)]
    pub params: Value,
    /// Target environment (e.g. `staging`, `production`)
    pub environment: String,
}

/// The value transported between graph nodes.
///
/// Within a single node execution `messages` and `captured_insights` are
/// append-only; a node may add entries but never rewrite history. All other
/// fields are single-valued and overwritten on merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    /// Ordered conversation history
    pub messages: Vec<Message>,

    /// Stable conversation identifier
    pub thread_id: String,

    /// Per-run identifier, new for each execute invocation
    pub workflow_id: String,

    /// Node that just ran; empty on start
    #[serde(default)]
    pub current_agent: String,

    /// Node to run next, or the `end` sentinel
    #[serde(default)]
    pub next_agent: String,

    /// Supervisor's routing choice, if one was made this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_decision: Option<RoutingDecision>,

    /// Operation awaiting approval, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_operation: Option<PendingOperation>,

    /// Whether the pending operation needs a human decision
    #[serde(default)]
    pub requires_approval: bool,

    /// Approval lifecycle state
    #[serde(default)]
    pub approval_status: ApprovalStatus,

    /// Identifier of the active approval request; set iff status is pending
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_request_id: Option<String>,

    /// Risk classification of the pending operation
    #[serde(default)]
    pub risk_level: RiskLevel,

    /// Structured per-subtask results, keyed by subtask id
    #[serde(default)]
    pub task_result: BTreeMap<String, Value>,

    /// Workspace metadata (repo, language, pr_number, ...)
    #[serde(default)]
    pub project_context: BTreeMap<String, String>,

    /// Interaction mode of the current run
    #[serde(default)]
    pub session_mode: SessionMode,

    /// Short insights captured along the way; append-only
    #[serde(default)]
    pub captured_insights: Vec<String>,

    /// Worker that requested approval, recorded at interrupt so the
    /// approval node can route back to it on resume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_agent: Option<String>,
}

impl WorkflowState {
    /// Create a fresh state for a thread.
    pub fn new(
        thread_id: impl Into<String>,
        workflow_id: impl Into<String>,
        session_mode: SessionMode,
    ) -> Self {
        Self {
            messages: Vec::new(),
            thread_id: thread_id.into(),
            workflow_id: workflow_id.into(),
            current_agent: String::new(),
            next_agent: String::new(),
            routing_decision: None,
            pending_operation: None,
            requires_approval: false,
            approval_status: ApprovalStatus::None,
            approval_request_id: None,
            risk_level: RiskLevel::Low,
            task_result: BTreeMap::new(),
            project_context: BTreeMap::new(),
            session_mode,
            captured_insights: Vec::new(),
            pending_agent: None,
        }
    }

    /// Append a message to the history.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Apply a node's delta: append lists, overwrite set scalars.
    pub fn apply(&mut self, delta: StateDelta) {
        self.messages.extend(delta.messages);
        self.captured_insights.extend(delta.captured_insights);
        for (key, value) in delta.task_result {
            self.task_result.insert(key, value);
        }
        if let Some(agent) = delta.current_agent {
            self.current_agent = agent;
        }
        if let Some(next) = delta.next_agent {
            self.next_agent = next;
        }
        if let Some(decision) = delta.routing_decision {
            self.routing_decision = Some(decision);
        }
        if let Some(op) = delta.pending_operation {
            self.pending_operation = op;
        }
        if let Some(required) = delta.requires_approval {
            self.requires_approval = required;
        }
        if let Some(status) = delta.approval_status {
            self.approval_status = status;
        }
        if let Some(id) = delta.approval_request_id {
            self.approval_request_id = id;
        }
        if let Some(level) = delta.risk_level {
            self.risk_level = level;
        }
        if let Some(agent) = delta.pending_agent {
            self.pending_agent = agent;
        }
    }

    /// Check the state invariants against the graph's node set.
    pub fn validate(&self, known_nodes: &HashSet<String>) -> Result<()> {
        if !self.next_agent.is_empty()
            && self.next_agent != END
            && !known_nodes.contains(&self.next_agent)
        {
            return Err(EngineError::Validation(format!(
                "next_agent '{}' is not a known node",
                self.next_agent
            )));
        }
        if self.requires_approval && self.pending_operation.is_none() {
            return Err(EngineError::Validation(
                "requires_approval set without a pending operation".to_string(),
            ));
        }
        let pending = self.approval_status == ApprovalStatus::Pending;
        if pending != self.approval_request_id.is_some() {
            return Err(EngineError::Validation(
                "approval_request_id must be set exactly when approval is pending".to_string(),
            ));
        }
        Ok(())
    }
}

/// A node's state update: messages and insights to append plus
/// single-valued fields to overwrite.
///
/// `Option<Option<T>>` fields distinguish "leave unchanged" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    /// Messages to append
    pub messages: Vec<Message>,
    /// Insights to append
    pub captured_insights: Vec<String>,
    /// Subtask results to merge by key
    pub task_result: BTreeMap<String, Value>,
    /// Overwrite `current_agent`
    pub current_agent: Option<String>,
    /// Overwrite `next_agent`
    pub next_agent: Option<String>,
    /// Overwrite `routing_decision`
    pub routing_decision: Option<RoutingDecision>,
    /// Set or clear `pending_operation`
    pub pending_operation: Option<Option<PendingOperation>>,
    /// Overwrite `requires_approval`
    pub requires_approval: Option<bool>,
    /// Overwrite `approval_status`
    pub approval_status: Option<ApprovalStatus>,
    /// Set or clear `approval_request_id`
    pub approval_request_id: Option<Option<String>>,
    /// Overwrite `risk_level`
    pub risk_level: Option<RiskLevel>,
    /// Set or clear `pending_agent`
    pub pending_agent: Option<Option<String>>,
}

impl StateDelta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Append an insight.
    pub fn with_insight(mut self, insight: impl Into<String>) -> Self {
        self.captured_insights.push(insight.into());
        self
    }

    /// Merge a subtask result.
    pub fn with_task_result(mut self, key: impl Into<String>, value: Value) -> Self {
        self.task_result.insert(key.into(), value);
        self
    }

    /// Set the next node to run.
    pub fn with_next_agent(mut self, next: impl Into<String>) -> Self {
        self.next_agent = Some(next.into());
        self
    }

    /// Record the supervisor's routing choice.
    pub fn with_routing_decision(mut self, decision: RoutingDecision) -> Self {
        self.routing_decision = Some(decision);
        self
    }

    /// Set the pending operation.
    pub fn with_pending_operation(mut self, op: PendingOperation) -> Self {
        self.pending_operation = Some(Some(op));
        self
    }

    /// Clear the pending operation.
    pub fn clear_pending_operation(mut self) -> Self {
        self.pending_operation = Some(None);
        self
    }

    /// Set the approval requirement flag.
    pub fn with_requires_approval(mut self, required: bool) -> Self {
        self.requires_approval = Some(required);
        self
    }

    /// Set the approval lifecycle status.
    pub fn with_approval_status(mut self, status: ApprovalStatus) -> Self {
        self.approval_status = Some(status);
        self
    }

    /// Set the active approval request id.
    pub fn with_approval_request_id(mut self, id: impl Into<String>) -> Self {
        self.approval_request_id = Some(Some(id.into()));
        self
    }

    /// Clear the active approval request id.
    pub fn clear_approval_request_id(mut self) -> Self {
        self.approval_request_id = Some(None);
        self
    }

    /// Set the risk classification.
    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = Some(level);
        self
    }

    /// Record the worker awaiting approval.
    pub fn with_pending_agent(mut self, agent: impl Into<String>) -> Self {
        self.pending_agent = Some(Some(agent.into()));
        self
    }

    /// Clear the worker awaiting approval.
    pub fn clear_pending_agent(mut self) -> Self {
        self.pending_agent = Some(None);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known_nodes() -> HashSet<String> {
        ["supervisor", "feature_dev", "approval"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_apply_appends_messages() {
        let mut state = WorkflowState::new("t1", "w1", SessionMode::Agent);
        state.push_message(Message::user("do the thing"));

        let delta = StateDelta::new()
            .with_message(Message::assistant("on it"))
            .with_next_agent("feature_dev");
        state.apply(delta);

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.next_agent, "feature_dev");
    }

    #[test]
    fn test_apply_set_and_clear_pending_operation() {
        let mut state = WorkflowState::new("t1", "w1", SessionMode::Agent);
        let op = PendingOperation {
            kind: "deploy".to_string(),
            target: "v2.5".to_string(),
            params: json!({}),
            environment: "production".to_string(),
        };

        state.apply(StateDelta::new().with_pending_operation(op.clone()));
        assert_eq!(state.pending_operation, Some(op));

        // An empty delta leaves it untouched; an explicit clear removes it.
        state.apply(StateDelta::new());
        assert!(state.pending_operation.is_some());
        state.apply(StateDelta::new().clear_pending_operation());
        assert!(state.pending_operation.is_none());
    }

    #[test]
    fn test_validate_next_agent_membership() {
        let mut state = WorkflowState::new("t1", "w1", SessionMode::Agent);
        state.next_agent = "feature_dev".to_string();
        assert!(state.validate(&known_nodes()).is_ok());

        state.next_agent = END.to_string();
        assert!(state.validate(&known_nodes()).is_ok());

        state.next_agent = "nonexistent".to_string();
        assert!(state.validate(&known_nodes()).is_err());
    }

    #[test]
    fn test_validate_approval_invariants() {
        let mut state = WorkflowState::new("t1", "w1", SessionMode::Agent);

        state.requires_approval = true;
        assert!(state.validate(&known_nodes()).is_err());

        state.pending_operation = Some(PendingOperation {
            kind: "deploy".to_string(),
            target: "api".to_string(),
            params: json!({}),
            environment: "production".to_string(),
        });
        assert!(state.validate(&known_nodes()).is_ok());

        state.approval_status = ApprovalStatus::Pending;
        assert!(state.validate(&known_nodes()).is_err());

        state.approval_request_id = Some("req-1".to_string());
        assert!(state.validate(&known_nodes()).is_ok());
    }

    #[test]
    fn test_state_round_trip() {
        let mut state = WorkflowState::new("t1", "w1", SessionMode::Agent);
        state.push_message(Message::user("deploy v2.5 to production"));
        state.push_message(Message::assistant("requesting approval"));
        state.risk_level = RiskLevel::Critical;
        state
            .task_result
            .insert("infrastructure".to_string(), json!({"status": "pending"}));
        state
            .project_context
            .insert("repo".to_string(), "steward".to_string());

        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: WorkflowState = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, state);

        // Serialization is stable: encoding the decoded value is
        // byte-identical to the first encoding.
        assert_eq!(serde_json::to_string(&decoded).unwrap(), encoded);
    }
}
