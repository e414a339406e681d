//! Progressive tool selection.
//!
//! `select_tools` is a pure function of (task description, agent profile,
//! strategy, catalog snapshot): identical inputs produce an identical
//! ordered list and content hash. The hash keys the agent runtime's
//! binding cache.

use crate::tools::catalog::{ToolDescriptor, ToolPriority};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::str::FromStr;

/// Tag identifying tools that are always bound.
const UNIVERSAL_TAG: &str = "universal";

/// Tool loading strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStrategy {
    /// Universal tools plus keyword matches on the task description
    Minimal,
    /// The agent's declared recommended and shared tools
    AgentProfile,
    /// Minimal plus the critical and high tools of the agent profile
    #[default]
    Progressive,
    /// Every discovered tool; expensive in tokens
    Full,
}

impl FromStr for ToolStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(ToolStrategy::Minimal),
            "agent_profile" => Ok(ToolStrategy::AgentProfile),
            "progressive" => Ok(ToolStrategy::Progressive),
            "full" => Ok(ToolStrategy::Full),
            other => Err(format!("unknown tool strategy '{other}'")),
        }
    }
}

/// An agent's statically declared tool preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentToolProfile {
    /// Tools the agent works best with
    pub recommended: Vec<String>,
    /// Tools shared across agents of this kind
    pub shared: Vec<String>,
}

impl AgentToolProfile {
    /// Declare a profile from name slices.
    pub fn new(recommended: &[&str], shared: &[&str]) -> Self {
        Self {
            recommended: recommended.iter().map(|s| s.to_string()).collect(),
            shared: shared.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.recommended
            .iter()
            .chain(self.shared.iter())
            .map(String::as_str)
    }
}

/// The outcome of tool selection.
#[derive(Debug, Clone)]
pub struct SelectedTools {
    /// Selected descriptors, in a deterministic order
    pub tools: Vec<ToolDescriptor>,
    /// Stable digest of the sorted tool names
    pub hash: String,
}

impl SelectedTools {
    /// Names of the selected tools, in order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool_name.as_str()).collect()
    }
}

/// Select the tool set for one agent invocation.
pub fn select_tools(
    task_description: &str,
    profile: &AgentToolProfile,
    strategy: ToolStrategy,
    catalog: &[ToolDescriptor],
    max_tools: usize,
) -> SelectedTools {
    let mut selected: Vec<ToolDescriptor> = match strategy {
        ToolStrategy::Minimal => minimal_set(task_description, catalog),
        ToolStrategy::AgentProfile => profile_set(profile, catalog),
        ToolStrategy::Progressive => {
            let mut tools = minimal_set(task_description, catalog);
            let present: HashSet<String> =
                tools.iter().map(|t| t.tool_name.clone()).collect();
            for tool in profile_set(profile, catalog) {
                let prioritised =
                    matches!(tool.priority, ToolPriority::Critical | ToolPriority::High);
                if prioritised && !present.contains(&tool.tool_name) {
                    tools.push(tool);
                }
            }
            tools
        }
        ToolStrategy::Full => {
            tracing::warn!(
                count = catalog.len(),
                "full tool loading requested; expect high token cost"
            );
            catalog.to_vec()
        }
    };

    if selected.len() > max_tools {
        selected = apply_size_limit(selected, max_tools);
    }

    let hash = content_hash(&selected);
    SelectedTools {
        tools: selected,
        hash,
    }
}

/// Universal tools plus keyword-tag matches, in discovery order.
fn minimal_set(task_description: &str, catalog: &[ToolDescriptor]) -> Vec<ToolDescriptor> {
    let keywords: HashSet<String> = task_description
        .to_lowercase()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();

    catalog
        .iter()
        .filter(|tool| {
            let universal = tool.priority == ToolPriority::Critical
                && tool.tags.iter().any(|t| t == UNIVERSAL_TAG);
            let keyword_match = tool
                .tags
                .iter()
                .any(|tag| keywords.contains(&tag.to_lowercase()));
            universal || keyword_match
        })
        .cloned()
        .collect()
}

/// The agent's declared tools, in declaration order, deduplicated.
fn profile_set(profile: &AgentToolProfile, catalog: &[ToolDescriptor]) -> Vec<ToolDescriptor> {
    let mut seen = HashSet::new();
    profile
        .names()
        .filter(|name| seen.insert(name.to_string()))
        .filter_map(|name| catalog.iter().find(|t| t.tool_name == name))
        .cloned()
        .collect()
}

/// Keep all critical tools, then high in order, then medium; drop low.
fn apply_size_limit(selected: Vec<ToolDescriptor>, max_tools: usize) -> Vec<ToolDescriptor> {
    let mut kept: Vec<ToolDescriptor> = selected
        .iter()
        .filter(|t| t.priority == ToolPriority::Critical)
        .cloned()
        .collect();

    for priority in [ToolPriority::High, ToolPriority::Medium] {
        for tool in selected.iter().filter(|t| t.priority == priority) {
            if kept.len() >= max_tools {
                return kept;
            }
            kept.push(tool.clone());
        }
    }

    kept
}

/// SHA-256 over the sorted tool names.
fn content_hash(tools: &[ToolDescriptor]) -> String {
    let mut names: Vec<&str> = tools.iter().map(|t| t.tool_name.as_str()).collect();
    names.sort_unstable();

    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn catalog() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("file_read", "fs", "Read a file", ToolPriority::Critical)
                .with_tags(&["universal", "file"]),
            ToolDescriptor::new("file_write", "fs", "Write a file", ToolPriority::Critical)
                .with_tags(&["universal", "file"]),
            ToolDescriptor::new("git_status", "git", "Working tree status", ToolPriority::High)
                .with_tags(&["git", "status"]),
            ToolDescriptor::new("deploy_service", "infra", "Deploy a service", ToolPriority::High)
                .with_tags(&["deploy", "release"]),
            ToolDescriptor::new("run_tests", "ci", "Run the test suite", ToolPriority::Medium)
                .with_tags(&["tests", "ci"]),
            ToolDescriptor::new("format_code", "dev", "Format sources", ToolPriority::Low)
                .with_tags(&["format"]),
        ]
    }

    #[test]
    fn test_minimal_selects_universal_and_keyword_matches() {
        let selected = select_tools(
            "deploy the api service",
            &AgentToolProfile::default(),
            ToolStrategy::Minimal,
            &catalog(),
            60,
        );
        assert_eq!(
            selected.names(),
            vec!["file_read", "file_write", "deploy_service"]
        );
    }

    #[test]
    fn test_agent_profile_follows_declaration_order() {
        let profile = AgentToolProfile::new(&["run_tests"], &["git_status", "run_tests"]);
        let selected = select_tools(
            "anything",
            &profile,
            ToolStrategy::AgentProfile,
            &catalog(),
            60,
        );
        assert_eq!(selected.names(), vec!["run_tests", "git_status"]);
    }

    #[test]
    fn test_progressive_unions_minimal_with_profile() {
        let profile = AgentToolProfile::new(&["git_status", "run_tests", "format_code"], &[]);
        let selected = select_tools(
            "fix the login bug",
            &profile,
            ToolStrategy::Progressive,
            &catalog(),
            60,
        );
        // Universal tools, then critical/high profile tools; run_tests is
        // medium and format_code is low, so neither joins.
        assert_eq!(
            selected.names(),
            vec!["file_read", "file_write", "git_status"]
        );
    }

    #[test]
    fn test_full_returns_everything() {
        let selected = select_tools(
            "",
            &AgentToolProfile::default(),
            ToolStrategy::Full,
            &catalog(),
            60,
        );
        assert_eq!(selected.tools.len(), 6);
    }

    #[test]
    fn test_size_limit_drops_low_first() {
        // Limit below the catalog size: critical survive, low never joins.
        let selected = select_tools(
            "",
            &AgentToolProfile::default(),
            ToolStrategy::Full,
            &catalog(),
            4,
        );
        let names = selected.names();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"file_read"));
        assert!(names.contains(&"file_write"));
        assert!(!names.contains(&"format_code"));
    }

    #[test]
    fn test_size_limit_keeps_all_critical() {
        // A limit smaller than the critical count still keeps every
        // critical tool.
        let selected = select_tools(
            "",
            &AgentToolProfile::default(),
            ToolStrategy::Full,
            &catalog(),
            1,
        );
        assert_eq!(selected.names(), vec!["file_read", "file_write"]);
    }

    #[test]
    fn test_hash_ignores_order_but_not_membership() {
        let a = content_hash(&catalog()[..2]);
        let mut reversed: Vec<ToolDescriptor> = catalog()[..2].to_vec();
        reversed.reverse();
        let b = content_hash(&reversed);
        assert_eq!(a, b);

        let c = content_hash(&catalog()[..3]);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn prop_selection_is_deterministic(task in ".{0,80}") {
            let profile = AgentToolProfile::new(&["git_status"], &["run_tests"]);
            let first = select_tools(&task, &profile, ToolStrategy::Progressive, &catalog(), 60);
            let second = select_tools(&task, &profile, ToolStrategy::Progressive, &catalog(), 60);
            prop_assert_eq!(first.names(), second.names());
            prop_assert_eq!(first.hash, second.hash);
        }
    }
}
