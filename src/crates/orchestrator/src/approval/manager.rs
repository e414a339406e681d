//! Approval request lifecycle.

use crate::db::{ApprovalRepository, ApprovalRow};
use crate::metrics::Metrics;
use crate::approval::tracker::IssueTracker;
use crate::{OrchestratorError, Result};
use chrono::Utc;
use std::sync::Arc;
use steward_core::{ApprovalDecision, PendingOperation, ResumeTicket, RiskLevel};

/// Outcome of a resolution attempt.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// This caller won the terminal transition; resume with the ticket.
    Resolved {
        /// Ticket the engine consumes to continue the thread
        ticket: ResumeTicket,
        /// The updated row
        row: ApprovalRow,
    },

    /// The row was already terminal. Idempotent: the existing state is
    /// returned and no resume should be triggered.
    AlreadyResolved(ApprovalRow),
}

/// Creates and resolves approval requests, mirroring them to the tracker.
pub struct ApprovalManager {
    repo: ApprovalRepository,
    tracker: Arc<dyn IssueTracker>,
    metrics: Arc<Metrics>,
}

impl ApprovalManager {
    /// Create a manager.
    pub fn new(
        repo: ApprovalRepository,
        tracker: Arc<dyn IssueTracker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repo,
            tracker,
            metrics,
        }
    }

    /// The underlying repository.
    pub fn repository(&self) -> &ApprovalRepository {
        &self.repo
    }

    /// Create an approval request, or return the existing one.
    ///
    /// Idempotent by (workflow_id, checkpoint_id): a node re-entered after
    /// a crash or a duplicate interrupt gets the same row back instead of
    /// opening a second tracker issue.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_request(
        &self,
        workflow_id: &str,
        thread_id: &str,
        checkpoint_id: u64,
        agent_name: &str,
        risk_level: RiskLevel,
        operation: &PendingOperation,
        pr_number: Option<i64>,
    ) -> Result<ApprovalRow> {
        if let Some(existing) = self
            .repo
            .find_by_natural_key(workflow_id, checkpoint_id)
            .await?
        {
            tracing::debug!(
                request_id = %existing.request_id,
                "approval request already exists for this checkpoint"
            );
            return Ok(existing);
        }

        let row = self
            .repo
            .insert(
                workflow_id,
                thread_id,
                checkpoint_id,
                agent_name,
                risk_level,
                operation,
                pr_number,
            )
            .await?;

        let title = format!(
            "[{}] Approval required: {} {}",
            risk_level.as_str(),
            operation.kind,
            operation.target
        );
        let description = format!(
            "Workflow `{workflow_id}` paused for approval.\n\n\
             - Agent: {agent_name}\n\
             - Risk: {}\n\
             - Operation: {} `{}` in `{}`\n\
             - Thread: {thread_id}\n\n\
             Move this issue to an approved or rejected state to resume the workflow.",
            risk_level.as_str(),
            operation.kind,
            operation.target,
            operation.environment,
        );

        let issue = match self
            .tracker
            .create_issue(&title, &description, tracker_priority(risk_level))
            .await
        {
            Ok(issue) => issue,
            Err(err) => {
                // The row without an issue can never be resolved; expire it
                // so the sweep does not count it as backlog forever.
                self.repo.mark_expired(&row.request_id).await?;
                return Err(err);
            }
        };

        if let Err(err) = self
            .repo
            .attach_issue(&row.request_id, &issue.id, &issue.url)
            .await
        {
            let _ = self.tracker.close_issue(&issue.id).await;
            self.repo.mark_expired(&row.request_id).await?;
            return Err(err);
        }

        if let Some(pr) = pr_number {
            let comment = format!(
                "Approval required before proceeding: {} (risk: {})",
                issue.url,
                risk_level.as_str()
            );
            if let Err(err) = self.tracker.comment_on_pr(pr, &comment).await {
                tracing::warn!(pr_number = pr, error = %err, "failed to comment on PR");
            }
        }

        self.metrics
            .approvals_created_total
            .inc(&[agent_name, risk_level.as_str()]);
        self.refresh_backlog().await?;

        self.repo
            .get(&row.request_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(row.request_id))
    }

    /// Resolve a pending request by its external issue id.
    ///
    /// Concurrent resolvers produce exactly one winner; everyone else gets
    /// [`ResolveOutcome::AlreadyResolved`] with the terminal row.
    pub async fn resolve(
        &self,
        external_issue_id: &str,
        decision: ApprovalDecision,
        resolver: &str,
        reason: Option<&str>,
    ) -> Result<ResolveOutcome> {
        let existing = self
            .repo
            .find_by_issue(external_issue_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(external_issue_id.to_string()))?;

        let updated = self
            .repo
            .try_resolve(external_issue_id, decision.as_str(), resolver, reason)
            .await?;

        let Some(row) = updated else {
            tracing::info!(
                issue = external_issue_id,
                status = %existing.status,
                "resolution ignored: request already terminal"
            );
            return Ok(ResolveOutcome::AlreadyResolved(existing));
        };

        self.metrics.approvals_resolved_total.inc(&[
            &row.agent_name,
            &row.risk_level,
            decision.as_str(),
        ]);
        if let Some(resolved_at) = row.resolved_at {
            let latency = (resolved_at - row.created_at).num_milliseconds().max(0) as f64 / 1000.0;
            self.metrics.approval_latency_seconds.observe(&[], latency);
        }
        self.refresh_backlog().await?;

        let ticket = ResumeTicket {
            thread_id: row.thread_id.clone(),
            checkpoint_id: row.checkpoint_id as u64,
            decision,
        };
        Ok(ResolveOutcome::Resolved { ticket, row })
    }

    /// Expire pending requests older than the timeout. Returns how many.
    pub async fn expire_stale(&self, timeout: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now() - timeout;
        let expired = self.repo.expire_stale(cutoff).await?;
        if expired > 0 {
            tracing::info!(count = expired, "expired stale approval requests");
            self.metrics.approvals_timeouts_total.inc_by(&[], expired);
            self.refresh_backlog().await?;
        }
        Ok(expired)
    }

    /// Recompute the backlog gauge from the store.
    pub async fn refresh_backlog(&self) -> Result<()> {
        let counts = self.repo.backlog_by_risk().await?;
        for risk in ["low", "medium", "high", "critical"] {
            let value = counts
                .iter()
                .find(|(r, _)| r == risk)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            self.metrics.approvals_backlog.set(&[risk], value);
        }
        Ok(())
    }
}

fn tracker_priority(risk: RiskLevel) -> u8 {
    match risk {
        RiskLevel::Critical => 1,
        RiskLevel::High => 2,
        RiskLevel::Medium => 3,
        RiskLevel::Low => 4,
    }
}
