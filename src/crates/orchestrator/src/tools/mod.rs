//! Tool catalog and progressive tool loading.
//!
//! The catalog holds discovered tool descriptors behind a read-mostly
//! snapshot with TTL-based refresh; selection is a pure function over a
//! snapshot so determinism is testable.

pub mod catalog;
pub mod select;

pub use catalog::{StaticToolDiscovery, ToolCatalog, ToolDescriptor, ToolDiscovery, ToolPriority};
pub use select::{select_tools, AgentToolProfile, SelectedTools, ToolStrategy};
