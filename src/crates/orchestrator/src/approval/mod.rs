//! Human-in-the-loop approvals.
//!
//! The manager owns approval request lifecycle and mirrors each request to
//! the external issue tracker. Two resolution channels feed it (the
//! tracker webhook and a fallback poll), and the natural-key idempotency
//! of `resolve` makes double delivery safe.

pub mod background;
pub mod manager;
pub mod tracker;

pub use manager::{ApprovalManager, ResolveOutcome};
pub use tracker::{HttpTracker, IssueTracker, TrackerIssue};
