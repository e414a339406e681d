//! Workflow graph assembly.
//!
//! Builds the compiled graph out of the node handlers: the conversational
//! entry for ask mode, the supervisor entry for agent mode, one worker
//! node per agent, and the approval gate.

use crate::agents::{spec::WORKER_AGENTS, AgentRuntime};
use crate::approval::ApprovalManager;
use crate::nodes::{ApprovalNode, ConversationalNode, SupervisorNode, WorkerNode};
use crate::risk::RiskAssessor;
use std::sync::Arc;
use steward_core::{ApprovalStatus, Graph, Result, SessionMode, END};

/// Build the workflow graph.
pub fn build_graph(
    runtime: Arc<AgentRuntime>,
    manager: Arc<ApprovalManager>,
    risk: Arc<RiskAssessor>,
) -> Result<Graph> {
    let mut builder = Graph::builder()
        .add_node("conversational", Arc::new(ConversationalNode::new(runtime.clone())))
        .add_edge("conversational", END)
        .add_node("supervisor", Arc::new(SupervisorNode::new()))
        .add_conditional_edge("supervisor", |state| {
            if state.next_agent.is_empty() {
                END.to_string()
            } else {
                state.next_agent.clone()
            }
        })
        .add_node("approval", Arc::new(ApprovalNode::new(manager)))
        .add_conditional_edge("approval", |state| match state.approval_status {
            ApprovalStatus::Approved => state
                .pending_agent
                .clone()
                .unwrap_or_else(|| "supervisor".to_string()),
            _ => "supervisor".to_string(),
        });

    for agent in WORKER_AGENTS {
        let name = agent.to_string();
        builder = builder
            .add_node(
                name.clone(),
                Arc::new(WorkerNode::new(name.clone(), runtime.clone(), risk.clone())),
            )
            .add_conditional_edge(name.clone(), move |state| {
                if state.requires_approval {
                    return "approval".to_string();
                }
                let complete = state
                    .task_result
                    .get(&name)
                    .and_then(|r| r.get("status"))
                    .and_then(|s| s.as_str())
                    == Some("complete");
                if complete {
                    END.to_string()
                } else {
                    "supervisor".to_string()
                }
            });
    }

    builder
        .set_entry_point(SessionMode::Ask, "conversational")
        .set_entry_point(SessionMode::Agent, "supervisor")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::executor::ToolExecutorRegistry;
    use crate::agents::AgentRegistry;
    use crate::approval::manager::ApprovalManager;
    use crate::db::{ApprovalRepository, DatabaseConnection};
    use crate::metrics::Metrics;
    use crate::tools::{StaticToolDiscovery, ToolCatalog};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use steward_core::llm::{ChatModel, ChatRequest, ChatResponse};
    use steward_core::Message;

    struct NullModel;

    #[async_trait]
    impl ChatModel for NullModel {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                message: Message::assistant("ok"),
                usage: None,
            })
        }
    }

    struct NullTracker;

    #[async_trait]
    impl crate::approval::IssueTracker for NullTracker {
        async fn create_issue(
            &self,
            _title: &str,
            _description: &str,
            _priority: u8,
        ) -> crate::Result<crate::approval::TrackerIssue> {
            Ok(crate::approval::TrackerIssue {
                id: "ISS-1".to_string(),
                url: "https://tracker/ISS-1".to_string(),
            })
        }
        async fn close_issue(&self, _issue_id: &str) -> crate::Result<()> {
            Ok(())
        }
        async fn comment_on_pr(&self, _pr_number: i64, _body: &str) -> crate::Result<()> {
            Ok(())
        }
        async fn issue_state(&self, _issue_id: &str) -> crate::Result<String> {
            Ok("Todo".to_string())
        }
    }

    #[tokio::test]
    async fn test_graph_builds_with_all_nodes() {
        let db = DatabaseConnection::connect("sqlite::memory:", 1).await.unwrap();
        db.run_migrations().await.unwrap();
        let metrics = Arc::new(Metrics::new());
        let catalog = Arc::new(ToolCatalog::new(
            Arc::new(StaticToolDiscovery::new(Vec::new())),
            Duration::from_secs(300),
        ));
        let runtime = Arc::new(AgentRuntime::new(
            Arc::new(AgentRegistry::defaults()),
            catalog,
            Arc::new(NullModel),
            Arc::new(ToolExecutorRegistry::new()),
            metrics.clone(),
            HashMap::new(),
            HashMap::new(),
            60,
            8,
            "test".to_string(),
        ));
        let manager = Arc::new(ApprovalManager::new(
            ApprovalRepository::new(db),
            Arc::new(NullTracker),
            metrics,
        ));

        let graph = build_graph(runtime, manager, Arc::new(RiskAssessor::builtin())).unwrap();
        for node in ["conversational", "supervisor", "approval"]
            .iter()
            .chain(WORKER_AGENTS)
        {
            assert!(graph.node_names().contains(*node), "missing node {node}");
        }
        assert_eq!(graph.entry_point(SessionMode::Ask).unwrap(), "conversational");
        assert_eq!(graph.entry_point(SessionMode::Agent).unwrap(), "supervisor");
    }
}
