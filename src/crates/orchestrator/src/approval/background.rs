//! Background maintenance loops.
//!
//! Approval timeouts are enforced by the expiry sweep, not by waiting
//! workers; an interrupted run holds no resources until resume. The
//! tracker poll is the fallback resolution channel for missed webhooks; in
//! the common case it is a no-op query.

use crate::approval::manager::{ApprovalManager, ResolveOutcome};
use crate::approval::tracker::IssueTracker;
use crate::metrics::Metrics;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use steward_core::{ApprovalDecision, Engine, EngineError};
use steward_checkpoint::CheckpointStore;
use tokio::task::JoinHandle;

/// Periodically expire pending approvals older than the timeout.
pub fn spawn_expiry_sweep(
    manager: Arc<ApprovalManager>,
    timeout: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = manager.expire_stale(timeout).await {
                tracing::warn!(error = %err, "approval expiry sweep failed");
            }
        }
    })
}

/// Periodically poll the tracker for pending approvals whose webhook was
/// missed, resolving and resuming any that moved to a terminal state.
pub fn spawn_tracker_poll(
    manager: Arc<ApprovalManager>,
    tracker: Arc<dyn IssueTracker>,
    engine: Arc<Engine>,
    approved_states: Vec<String>,
    rejected_states: Vec<String>,
    interval: Duration,
    metrics: Arc<Metrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let pending = match manager.repository().pending().await {
                Ok(rows) => rows,
                Err(err) => {
                    tracing::warn!(error = %err, "tracker poll could not list pending rows");
                    continue;
                }
            };

            for row in pending {
                let Some(issue_id) = row.external_issue_id.as_deref() else {
                    continue;
                };
                let state = match tracker.issue_state(issue_id).await {
                    Ok(state) => state,
                    Err(err) => {
                        tracing::debug!(issue = issue_id, error = %err, "issue state lookup failed");
                        continue;
                    }
                };

                let decision = if approved_states.iter().any(|s| s == &state) {
                    ApprovalDecision::Approved
                } else if rejected_states.iter().any(|s| s == &state) {
                    ApprovalDecision::Rejected
                } else {
                    continue;
                };

                tracing::info!(issue = issue_id, state = %state, "poll caught missed resolution");
                match manager.resolve(issue_id, decision, "tracker-poll", None).await {
                    Ok(ResolveOutcome::Resolved { ticket, .. }) => {
                        match engine.resume(ticket, None).await {
                            Ok(_) => {}
                            Err(EngineError::StaleResume { .. }) => {
                                metrics.stale_resume_total.inc(&[]);
                                tracing::warn!(issue = issue_id, "poll resume was stale");
                            }
                            Err(err) => {
                                tracing::warn!(issue = issue_id, error = %err, "poll resume failed");
                            }
                        }
                    }
                    Ok(ResolveOutcome::AlreadyResolved(_)) => {}
                    Err(err) => {
                        tracing::warn!(issue = issue_id, error = %err, "poll resolution failed");
                    }
                }
            }
        }
    })
}

/// Periodically prune non-latest checkpoints past their TTL.
pub fn spawn_checkpoint_pruner(
    store: Arc<dyn CheckpointStore>,
    ttl: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match store.prune_expired(Utc::now() - ttl).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "pruned expired checkpoints"),
                Err(err) => tracing::warn!(error = %err, "checkpoint pruning failed"),
            }
        }
    })
}
