//! Approval request persistence.
//!
//! The repository owns the row lifecycle: created pending, then exactly one
//! terminal transition to approved, rejected or expired. Concurrent
//! resolvers are serialised by a conditional UPDATE: the first writer
//! wins, later callers observe the terminal row.

use crate::db::connection::DatabaseConnection;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use steward_core::{PendingOperation, RiskLevel};
use uuid::Uuid;

/// A persisted approval request.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ApprovalRow {
    /// Primary key
    pub request_id: String,
    /// Run that requested approval
    pub workflow_id: String,
    /// Thread the run belongs to
    pub thread_id: String,
    /// Checkpoint the approval was taken against
    pub checkpoint_id: i64,
    /// Agent that requested approval
    pub agent_name: String,
    /// Risk classification at request time
    pub risk_level: String,
    /// JSON-encoded pending operation
    pub pending_operation: String,
    /// pending | approved | rejected | expired
    pub status: String,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// When the terminal transition happened
    pub resolved_at: Option<DateTime<Utc>>,
    /// Identity of the resolver
    pub resolver: Option<String>,
    /// Rejection reason, if given
    pub reason: Option<String>,
    /// Issue id in the external tracker; unique
    pub external_issue_id: Option<String>,
    /// Issue URL for the client to follow
    pub external_issue_url: Option<String>,
    /// Pull request the approval is linked to
    pub pr_number: Option<i64>,
}

impl ApprovalRow {
    /// Whether the row already reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status != "pending"
    }
}

/// Repository over the `approval_requests` table.
#[derive(Clone)]
pub struct ApprovalRepository {
    db: DatabaseConnection,
}

impl ApprovalRepository {
    /// Create a repository over an existing connection.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a pending row.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        workflow_id: &str,
        thread_id: &str,
        checkpoint_id: u64,
        agent_name: &str,
        risk_level: RiskLevel,
        pending_operation: &PendingOperation,
        pr_number: Option<i64>,
    ) -> Result<ApprovalRow> {
        let request_id = Uuid::new_v4().to_string();
        let operation_json = serde_json::to_string(pending_operation)?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO approval_requests \
             (request_id, workflow_id, thread_id, checkpoint_id, agent_name, risk_level, \
              pending_operation, status, created_at, pr_number) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
        )
        .bind(&request_id)
        .bind(workflow_id)
        .bind(thread_id)
        .bind(checkpoint_id as i64)
        .bind(agent_name)
        .bind(risk_level.as_str())
        .bind(&operation_json)
        .bind(now)
        .bind(pr_number)
        .execute(self.db.pool())
        .await?;

        self.get(&request_id)
            .await?
            .ok_or_else(|| crate::OrchestratorError::NotFound(request_id))
    }

    /// Fetch by primary key.
    pub async fn get(&self, request_id: &str) -> Result<Option<ApprovalRow>> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            "SELECT * FROM approval_requests WHERE request_id = ?",
        )
        .bind(request_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row)
    }

    /// Fetch by the creation idempotency key.
    pub async fn find_by_natural_key(
        &self,
        workflow_id: &str,
        checkpoint_id: u64,
    ) -> Result<Option<ApprovalRow>> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            "SELECT * FROM approval_requests WHERE workflow_id = ? AND checkpoint_id = ?",
        )
        .bind(workflow_id)
        .bind(checkpoint_id as i64)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row)
    }

    /// Fetch by external issue id.
    pub async fn find_by_issue(&self, external_issue_id: &str) -> Result<Option<ApprovalRow>> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            "SELECT * FROM approval_requests WHERE external_issue_id = ?",
        )
        .bind(external_issue_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(row)
    }

    /// Attach the tracker issue to a freshly created row.
    pub async fn attach_issue(
        &self,
        request_id: &str,
        external_issue_id: &str,
        external_issue_url: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE approval_requests \
             SET external_issue_id = ?, external_issue_url = ? \
             WHERE request_id = ?",
        )
        .bind(external_issue_id)
        .bind(external_issue_url)
        .bind(request_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Attempt the terminal transition; only the first resolver succeeds.
    ///
    /// Returns the updated row, or `None` when the row was not pending;
    /// the caller then fetches the existing terminal state.
    pub async fn try_resolve(
        &self,
        external_issue_id: &str,
        status: &str,
        resolver: &str,
        reason: Option<&str>,
    ) -> Result<Option<ApprovalRow>> {
        let result = sqlx::query(
            "UPDATE approval_requests \
             SET status = ?, resolved_at = ?, resolver = ?, reason = ? \
             WHERE external_issue_id = ? AND status = 'pending'",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(resolver)
        .bind(reason)
        .bind(external_issue_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_issue(external_issue_id).await
    }

    /// Mark a row expired outside the sweep (e.g. tracker creation failed).
    pub async fn mark_expired(&self, request_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE approval_requests SET status = 'expired', resolved_at = ? \
             WHERE request_id = ? AND status = 'pending'",
        )
        .bind(Utc::now())
        .bind(request_id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Expire pending rows created before the cutoff; returns how many.
    pub async fn expire_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE approval_requests SET status = 'expired', resolved_at = ? \
             WHERE status = 'pending' AND created_at < ?",
        )
        .bind(Utc::now())
        .bind(cutoff)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// All pending rows, oldest first. Used by the fallback tracker poll.
    pub async fn pending(&self) -> Result<Vec<ApprovalRow>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            "SELECT * FROM approval_requests WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Pending counts per risk level, for the backlog gauge.
    pub async fn backlog_by_risk(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT risk_level, COUNT(*) FROM approval_requests \
             WHERE status = 'pending' GROUP BY risk_level",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}
