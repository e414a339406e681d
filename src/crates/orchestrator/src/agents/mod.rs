//! Agent definitions and the runtime that invokes them.
//!
//! Agents are plain data, not a class hierarchy: a struct of prompt,
//! sampling parameters and tool preferences in a registry. New agents are
//! added by inserting into the registry.

pub mod cache;
pub mod executor;
pub mod runtime;
pub mod spec;

pub use cache::{Binding, BindingCache};
pub use executor::{ToolExecutor, ToolExecutorRegistry, ToolHandler};
pub use runtime::{AgentRuntime, AgentTurn};
pub use spec::{AgentRegistry, AgentSpec};
