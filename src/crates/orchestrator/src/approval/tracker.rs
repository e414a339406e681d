//! Issue tracker client.
//!
//! The tracker is an external collaborator: an HTTP API for creating and
//! inspecting issues plus an inbound webhook handled by the API layer.
//! The trait keeps the approval manager testable without a live tracker.

use crate::{OrchestratorError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// An issue created in the external tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerIssue {
    /// Tracker-assigned identifier; the webhook natural key
    pub id: String,
    /// Browsable URL surfaced to the user
    pub url: String,
}

/// The tracker surface the approval manager depends on.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create an issue; priority 1 is most urgent.
    async fn create_issue(
        &self,
        title: &str,
        description: &str,
        priority: u8,
    ) -> Result<TrackerIssue>;

    /// Close an issue. Best-effort cleanup path.
    async fn close_issue(&self, issue_id: &str) -> Result<()>;

    /// Post a comment on a pull request linking the approval issue.
    async fn comment_on_pr(&self, pr_number: i64, body: &str) -> Result<()>;

    /// Current workflow state of an issue, as the tracker names it.
    async fn issue_state(&self, issue_id: &str) -> Result<String>;

    /// Whether the tracker is reachable.
    async fn ping(&self) -> bool {
        true
    }
}

/// HTTP implementation of [`IssueTracker`].
pub struct HttpTracker {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HttpTracker {
    /// Create a client with the given deadline.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl IssueTracker for HttpTracker {
    async fn create_issue(
        &self,
        title: &str,
        description: &str,
        priority: u8,
    ) -> Result<TrackerIssue> {
        let response = self
            .http
            .post(self.url("/api/issues"))
            .bearer_auth(&self.token)
            .json(&json!({
                "title": title,
                "description": description,
                "priority": priority,
            }))
            .send()
            .await
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::Tracker(format!(
                "issue creation failed with {}",
                response.status()
            )));
        }
        response
            .json::<TrackerIssue>()
            .await
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))
    }

    async fn close_issue(&self, issue_id: &str) -> Result<()> {
        self.http
            .post(self.url(&format!("/api/issues/{issue_id}/close")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))?;
        Ok(())
    }

    async fn comment_on_pr(&self, pr_number: i64, body: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/api/pulls/{pr_number}/comments")))
            .bearer_auth(&self.token)
            .json(&json!({"body": body}))
            .send()
            .await
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::Tracker(format!(
                "PR comment failed with {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn issue_state(&self, issue_id: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct IssueView {
            state: String,
        }

        let response = self
            .http
            .get(self.url(&format!("/api/issues/{issue_id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OrchestratorError::Tracker(format!(
                "issue lookup failed with {}",
                response.status()
            )));
        }
        let view: IssueView = response
            .json()
            .await
            .map_err(|e| OrchestratorError::Tracker(e.to_string()))?;
        Ok(view.state)
    }

    async fn ping(&self) -> bool {
        self.http
            .get(self.url("/api/health"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
