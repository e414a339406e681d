//! Node handlers wired into the workflow graph.

pub mod approval;
pub mod conversational;
pub mod supervisor;
pub mod worker;

pub use approval::ApprovalNode;
pub use conversational::ConversationalNode;
pub use supervisor::SupervisorNode;
pub use worker::{detect_operation, WorkerNode};
