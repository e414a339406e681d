//! Persistence: connection pooling, the SQLite checkpoint store and the
//! approval request repository.

pub mod approvals;
pub mod checkpoints;
pub mod connection;

pub use approvals::{ApprovalRepository, ApprovalRow};
pub use checkpoints::SqliteCheckpointStore;
pub use connection::DatabaseConnection;
