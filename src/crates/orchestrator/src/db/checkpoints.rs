//! SQLite-backed checkpoint store.

use crate::db::connection::DatabaseConnection;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use steward_checkpoint::{Checkpoint, CheckpointError, CheckpointStore};

/// Checkpoint store over the `checkpoints` table.
///
/// Atomicity and the single-winner guarantee come from the
/// `(thread_id, checkpoint_id)` primary key: the losing writer of a
/// concurrent advance hits a unique-constraint violation, surfaced as
/// [`CheckpointError::Conflict`].
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    db: DatabaseConnection,
}

impl SqliteCheckpointStore {
    /// Create a store over an existing connection.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn map_put_error(err: sqlx::Error, thread_id: &str, checkpoint_id: u64) -> CheckpointError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.message().contains("UNIQUE constraint failed") {
            return CheckpointError::Conflict {
                thread_id: thread_id.to_string(),
                checkpoint_id,
            };
        }
    }
    CheckpointError::Unavailable(err.to_string())
}

fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<Checkpoint, CheckpointError> {
    let blob: Vec<u8> = row.get("state_blob");
    let state = serde_json::from_slice(&blob)?;

    Ok(Checkpoint {
        thread_id: row.get("thread_id"),
        checkpoint_id: row.get::<i64, _>("checkpoint_id") as u64,
        parent_id: row.get::<Option<i64>, _>("parent_id").map(|v| v as u64),
        node: row.get("node"),
        state,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let blob = serde_json::to_vec(&checkpoint.state)?;

        sqlx::query(
            "INSERT INTO checkpoints \
             (thread_id, checkpoint_id, parent_id, node, state_blob, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.thread_id)
        .bind(checkpoint.checkpoint_id as i64)
        .bind(checkpoint.parent_id.map(|v| v as i64))
        .bind(&checkpoint.node)
        .bind(blob)
        .bind(checkpoint.created_at)
        .execute(self.db.pool())
        .await
        .map_err(|e| map_put_error(e, &checkpoint.thread_id, checkpoint.checkpoint_id))?;

        Ok(())
    }

    async fn get(
        &self,
        thread_id: &str,
        checkpoint_id: u64,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let row = sqlx::query(
            "SELECT thread_id, checkpoint_id, parent_id, node, state_blob, created_at \
             FROM checkpoints WHERE thread_id = ? AND checkpoint_id = ?",
        )
        .bind(thread_id)
        .bind(checkpoint_id as i64)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;

        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn get_latest(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let row = sqlx::query(
            "SELECT thread_id, checkpoint_id, parent_id, node, state_blob, created_at \
             FROM checkpoints WHERE thread_id = ? \
             ORDER BY checkpoint_id DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;

        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<Checkpoint>, CheckpointError> {
        let rows = sqlx::query(
            "SELECT thread_id, checkpoint_id, parent_id, node, state_blob, created_at \
             FROM checkpoints WHERE thread_id = ? \
             ORDER BY checkpoint_id ASC",
        )
        .bind(thread_id)
        .fetch_all(self.db.pool())
        .await
        .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;

        rows.iter().map(row_to_checkpoint).collect()
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), CheckpointError> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?")
            .bind(thread_id)
            .execute(self.db.pool())
            .await
            .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn prune_expired(&self, older_than: DateTime<Utc>) -> Result<u64, CheckpointError> {
        // The latest checkpoint of every thread is the resume point and is
        // always retained.
        let result = sqlx::query(
            "DELETE FROM checkpoints \
             WHERE created_at < ? \
               AND checkpoint_id < \
                   (SELECT MAX(c2.checkpoint_id) FROM checkpoints c2 \
                    WHERE c2.thread_id = checkpoints.thread_id)",
        )
        .bind(older_than)
        .execute(self.db.pool())
        .await
        .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
