//! The workflow graph as a value.
//!
//! A graph is a table of named node handlers plus a conditional edge
//! function per node and an entry point per session mode. There is no
//! reflection and no dynamic code: the engine is a plain loop over this
//! table.

use crate::error::{EngineError, Result};
use crate::node::NodeHandler;
use crate::state::{SessionMode, WorkflowState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Terminal sentinel: routing here ends the run.
pub const END: &str = "end";

/// Conditional edge: given the merged state, name the next node.
pub type EdgeFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// A compiled workflow graph.
pub struct Graph {
    nodes: HashMap<String, Arc<dyn NodeHandler>>,
    edges: HashMap<String, EdgeFn>,
    entry_points: HashMap<SessionMode, String>,
    node_names: HashSet<String>,
}

impl Graph {
    /// Start building a graph.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    /// Handler registered under the given name.
    pub fn node(&self, name: &str) -> Option<&Arc<dyn NodeHandler>> {
        self.nodes.get(name)
    }

    /// Set of registered node names (excludes the `end` sentinel).
    pub fn node_names(&self) -> &HashSet<String> {
        &self.node_names
    }

    /// Entry node for a session mode.
    pub fn entry_point(&self, mode: SessionMode) -> Result<&str> {
        self.entry_points
            .get(&mode)
            .map(String::as_str)
            .ok_or_else(|| {
                EngineError::Validation(format!("no entry point registered for {:?} mode", mode))
            })
    }

    /// Resolve the node that follows `current` given the merged state.
    ///
    /// The edge function's answer is validated against the node set; an
    /// unknown name is a graph bug surfaced as [`EngineError::UnknownNode`].
    pub fn next_node(&self, current: &str, state: &WorkflowState) -> Result<String> {
        let edge = self
            .edges
            .get(current)
            .ok_or_else(|| EngineError::UnknownNode(format!("no edge from '{current}'")))?;

        let next = edge(state);
        if next != END && !self.node_names.contains(&next) {
            return Err(EngineError::UnknownNode(next));
        }
        Ok(next)
    }
}

/// Builder validating the graph at build time.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, Arc<dyn NodeHandler>>,
    edges: HashMap<String, EdgeFn>,
    entry_points: HashMap<SessionMode, String>,
}

impl GraphBuilder {
    /// Register a node handler under a name.
    pub fn add_node(mut self, name: impl Into<String>, handler: Arc<dyn NodeHandler>) -> Self {
        self.nodes.insert(name.into(), handler);
        self
    }

    /// Register the conditional edge leaving a node.
    pub fn add_conditional_edge<F>(mut self, from: impl Into<String>, edge: F) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        self.edges.insert(from.into(), Arc::new(edge));
        self
    }

    /// Register an unconditional edge leaving a node.
    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let to = to.into();
        self.add_conditional_edge(from, move |_| to.clone())
    }

    /// Set the entry node for a session mode.
    pub fn set_entry_point(mut self, mode: SessionMode, node: impl Into<String>) -> Self {
        self.entry_points.insert(mode, node.into());
        self
    }

    /// Validate and produce the graph.
    ///
    /// Every node must have an outgoing edge, and every entry point must
    /// name a registered node.
    pub fn build(self) -> Result<Graph> {
        if self.nodes.is_empty() {
            return Err(EngineError::Validation("graph has no nodes".to_string()));
        }
        for name in self.nodes.keys() {
            if !self.edges.contains_key(name) {
                return Err(EngineError::Validation(format!(
                    "node '{name}' has no outgoing edge"
                )));
            }
        }
        for (mode, entry) in &self.entry_points {
            if !self.nodes.contains_key(entry) {
                return Err(EngineError::Validation(format!(
                    "entry point '{entry}' for {mode:?} mode is not a registered node"
                )));
            }
        }

        let node_names = self.nodes.keys().cloned().collect();
        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            entry_points: self.entry_points,
            node_names,
        })
    }
}
