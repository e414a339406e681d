//! Engine events emitted at node boundaries.
//!
//! The engine pushes events onto an outbound channel as a run progresses;
//! the streaming API layer maps them onto client-facing SSE frames. Events
//! carry the correlation ids (`thread_id`, `workflow_id`) so external
//! traces can be stitched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Sender half of a run's event channel.
pub type EventSender = mpsc::UnboundedSender<EngineEvent>;

/// An event describing run progress, emitted per node boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A node began executing.
    NodeStarted {
        thread_id: String,
        workflow_id: String,
        node: String,
        ts: DateTime<Utc>,
    },

    /// A node finished and its checkpoint was written.
    NodeCompleted {
        thread_id: String,
        workflow_id: String,
        node: String,
        duration_ms: u64,
        ts: DateTime<Utc>,
    },

    /// A node appended an assistant message.
    AgentMessage {
        thread_id: String,
        workflow_id: String,
        node: String,
        content: String,
        ts: DateTime<Utc>,
    },

    /// The run paused awaiting a human decision.
    ApprovalRequested {
        thread_id: String,
        workflow_id: String,
        node: String,
        approval_request_id: String,
        ts: DateTime<Utc>,
    },

    /// A pending approval was resolved and the run resumed.
    ApprovalResolved {
        thread_id: String,
        workflow_id: String,
        decision: String,
        ts: DateTime<Utc>,
    },

    /// The run reached the `end` sentinel.
    RunCompleted {
        thread_id: String,
        workflow_id: String,
        ts: DateTime<Utc>,
    },

    /// The run terminated with a failure; state is preserved for
    /// inspection.
    RunFailed {
        thread_id: String,
        workflow_id: String,
        error: String,
        ts: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// The thread this event belongs to.
    pub fn thread_id(&self) -> &str {
        match self {
            EngineEvent::NodeStarted { thread_id, .. }
            | EngineEvent::NodeCompleted { thread_id, .. }
            | EngineEvent::AgentMessage { thread_id, .. }
            | EngineEvent::ApprovalRequested { thread_id, .. }
            | EngineEvent::ApprovalResolved { thread_id, .. }
            | EngineEvent::RunCompleted { thread_id, .. }
            | EngineEvent::RunFailed { thread_id, .. } => thread_id,
        }
    }
}

/// Send an event, ignoring a departed receiver.
///
/// Runs resumed by a webhook have no live stream attached; their events
/// are log-only.
pub fn emit(sender: Option<&EventSender>, event: EngineEvent) {
    if let Some(sender) = sender {
        let _ = sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = EngineEvent::RunCompleted {
            thread_id: "t1".to_string(),
            workflow_id: "w1".to_string(),
            ts: Utc::now(),
        };
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], "run_completed");
        assert_eq!(encoded["thread_id"], "t1");
    }

    #[test]
    fn test_emit_tolerates_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        emit(
            Some(&tx),
            EngineEvent::RunCompleted {
                thread_id: "t1".to_string(),
                workflow_id: "w1".to_string(),
                ts: Utc::now(),
            },
        );
    }
}
