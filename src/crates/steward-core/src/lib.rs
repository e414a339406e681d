//! Core workflow orchestration engine for steward.
//!
//! This crate owns the data model and the execution machinery shared by the
//! service layer:
//!
//! - [`messages`] - the closed message sum type exchanged with the LLM
//! - [`state`] - [`WorkflowState`], the value transported between nodes,
//!   and [`StateDelta`], the merge-able update a node returns
//! - [`node`] - the [`NodeHandler`] trait and the `Advance`/`Interrupt`
//!   outcome variants
//! - [`graph`] - the graph as a value: a node table plus conditional edges
//! - [`engine`] - the execution loop, checkpointing, interrupt/resume and
//!   cancellation
//! - [`llm`] - provider-agnostic chat traits; concrete providers live in
//!   the `llm` crate
//!
//! The engine is a plain loop over the node table. There is no coroutine
//! and no saved stack: an interrupt is an ordinary return value, and the
//! checkpoint is the saved state.

pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod llm;
pub mod lock;
pub mod messages;
pub mod node;
pub mod state;

pub use engine::{Engine, EngineConfig, ResumeTicket, RunOutcome, RunRequest};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, EventSender};
pub use graph::{Graph, GraphBuilder, END};
pub use messages::{Message, ToolCall};
pub use node::{NodeContext, NodeHandler, NodeOutcome};
pub use state::{
    ApprovalDecision, ApprovalStatus, PendingOperation, RiskLevel, RoutingDecision, SessionMode,
    StateDelta, WorkflowState,
};
