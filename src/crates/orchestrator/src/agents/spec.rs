//! Agent specifications and the registry.

use crate::tools::{AgentToolProfile, ToolStrategy};
use std::collections::HashMap;
use std::sync::Arc;

/// Node names of the worker agents, in routing order.
pub const WORKER_AGENTS: &[&str] = &[
    "feature_dev",
    "code_review",
    "infrastructure",
    "cicd",
    "documentation",
];

/// A declarative agent definition.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Node name
    pub name: String,
    /// System prompt prepended to the agent's context
    pub system_prompt: String,
    /// Tool loading strategy
    pub tool_strategy: ToolStrategy,
    /// Sampling temperature
    pub temperature: f32,
    /// Response token budget
    pub max_tokens: u32,
    /// Declared tool preferences
    pub profile: AgentToolProfile,
}

impl AgentSpec {
    fn new(name: &str, system_prompt: &str, profile: AgentToolProfile) -> Self {
        Self {
            name: name.to_string(),
            system_prompt: system_prompt.to_string(),
            tool_strategy: ToolStrategy::Progressive,
            temperature: 0.2,
            max_tokens: 4096,
            profile,
        }
    }

    fn with_strategy(mut self, strategy: ToolStrategy) -> Self {
        self.tool_strategy = strategy;
        self
    }

    fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Registry of agents by node name.
pub struct AgentRegistry {
    agents: HashMap<String, Arc<AgentSpec>>,
}

impl AgentRegistry {
    /// The default agent set.
    pub fn defaults() -> Self {
        let mut registry = Self {
            agents: HashMap::new(),
        };

        registry.insert(
            AgentSpec::new(
                "conversational",
                "You are a helpful software engineering assistant. Answer questions \
                 about the workspace and about what you can do. Never perform changes.",
                AgentToolProfile::default(),
            )
            .with_strategy(ToolStrategy::Minimal)
            .with_temperature(0.7),
        );
        registry.insert(
            AgentSpec::new(
                "supervisor",
                "You are the supervisor of a team of engineering agents. Decide which \
                 agent should handle the current request.",
                AgentToolProfile::default(),
            )
            .with_strategy(ToolStrategy::Minimal),
        );
        registry.insert(AgentSpec::new(
            "feature_dev",
            "You implement features and fix bugs. Work incrementally and explain \
             each change.",
            AgentToolProfile::new(
                &["file_write", "run_tests", "git_commit"],
                &["file_read", "git_status"],
            ),
        ));
        registry.insert(AgentSpec::new(
            "code_review",
            "You review code changes for correctness, style and risk.",
            AgentToolProfile::new(&["git_diff", "lint"], &["file_read", "git_status"]),
        ));
        registry.insert(AgentSpec::new(
            "infrastructure",
            "You manage deployments and infrastructure changes. Describe the \
             operation you are about to perform before performing it.",
            AgentToolProfile::new(
                &["deploy_service", "terraform_plan", "k8s_status"],
                &["file_read"],
            ),
        ));
        registry.insert(AgentSpec::new(
            "cicd",
            "You maintain pipelines and releases.",
            AgentToolProfile::new(&["pipeline_status", "run_tests"], &["file_read"]),
        ));
        registry.insert(AgentSpec::new(
            "documentation",
            "You write and update project documentation.",
            AgentToolProfile::new(&["file_write"], &["file_read", "git_status"]),
        ));

        registry
    }

    /// Insert or replace an agent.
    pub fn insert(&mut self, spec: AgentSpec) {
        self.agents.insert(spec.name.clone(), Arc::new(spec));
    }

    /// Look up an agent by node name.
    pub fn get(&self, name: &str) -> Option<Arc<AgentSpec>> {
        self.agents.get(name).cloned()
    }

    /// Registered agent names.
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_nodes() {
        let registry = AgentRegistry::defaults();
        for name in WORKER_AGENTS {
            assert!(registry.get(name).is_some(), "missing agent {name}");
        }
        assert!(registry.get("supervisor").is_some());
        assert!(registry.get("conversational").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut registry = AgentRegistry::defaults();
        let mut spec = (*registry.get("cicd").unwrap()).clone();
        spec.temperature = 0.9;
        registry.insert(spec);
        assert_eq!(registry.get("cicd").unwrap().temperature, 0.9);
    }
}
