//! Tool discovery and the catalog snapshot.

use crate::{OrchestratorError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Binding priority of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPriority {
    /// Always worth binding
    Critical,
    /// Bind when the agent profile asks for it
    High,
    /// Bind when space allows
    Medium,
    /// First to drop under the size limit
    Low,
}

/// Static metadata describing one discoverable tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name
    pub tool_name: String,
    /// Server the tool is grouped under
    pub server: String,
    /// What the tool does
    pub description: String,
    /// JSON Schema of the tool's input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    /// Binding priority
    pub priority: ToolPriority,
    /// Keywords matched against task descriptions
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ToolDescriptor {
    /// Create a descriptor with the given priority and no tags.
    pub fn new(
        tool_name: impl Into<String>,
        server: impl Into<String>,
        description: impl Into<String>,
        priority: ToolPriority,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            server: server.into(),
            description: description.into(),
            input_schema: None,
            priority,
            tags: Vec::new(),
        }
    }

    /// Attach tags.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Attach the input schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// Source of tool descriptors, scanned at startup and on TTL expiry.
#[async_trait]
pub trait ToolDiscovery: Send + Sync {
    /// Enumerate every available tool.
    async fn discover(&self) -> Result<Vec<ToolDescriptor>>;
}

/// Discovery over a fixed descriptor list.
///
/// Used by tests and by deployments that declare their catalog in the
/// config file instead of scanning tool servers.
pub struct StaticToolDiscovery {
    tools: Vec<ToolDescriptor>,
}

impl StaticToolDiscovery {
    /// Create a discovery over the given descriptors.
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// The built-in development tool set, used when no catalog file is
    /// configured.
    pub fn builtin() -> Self {
        Self::new(vec![
            ToolDescriptor::new("file_read", "fs", "Read a file from the workspace", ToolPriority::Critical)
                .with_tags(&["universal", "file", "read"]),
            ToolDescriptor::new("file_write", "fs", "Write a file in the workspace", ToolPriority::Critical)
                .with_tags(&["universal", "file", "write"]),
            ToolDescriptor::new("git_status", "git", "Show working tree status", ToolPriority::High)
                .with_tags(&["git", "status"]),
            ToolDescriptor::new("git_diff", "git", "Show uncommitted changes", ToolPriority::High)
                .with_tags(&["git", "diff", "review"]),
            ToolDescriptor::new("git_commit", "git", "Commit staged changes", ToolPriority::Medium)
                .with_tags(&["git", "commit"]),
            ToolDescriptor::new("run_tests", "ci", "Run the project test suite", ToolPriority::High)
                .with_tags(&["tests", "test", "ci"]),
            ToolDescriptor::new("lint", "ci", "Run linters over the workspace", ToolPriority::Medium)
                .with_tags(&["lint", "review", "quality"]),
            ToolDescriptor::new("pipeline_status", "ci", "Inspect pipeline runs", ToolPriority::Medium)
                .with_tags(&["pipeline", "ci", "build"]),
            ToolDescriptor::new("deploy_service", "infra", "Deploy a service to an environment", ToolPriority::High)
                .with_tags(&["deploy", "release", "infra"]),
            ToolDescriptor::new("terraform_plan", "infra", "Preview infrastructure changes", ToolPriority::Medium)
                .with_tags(&["terraform", "infra", "plan"]),
            ToolDescriptor::new("k8s_status", "infra", "Inspect cluster workloads", ToolPriority::Medium)
                .with_tags(&["k8s", "kubernetes", "infra"]),
        ])
    }

    /// Load descriptors from a TOML file with a `[[tools]]` array.
    pub fn from_file(path: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct CatalogFile {
            tools: Vec<ToolDescriptor>,
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::Config(format!("failed to read {path}: {e}")))?;
        let file: CatalogFile = toml::from_str(&content)
            .map_err(|e| OrchestratorError::Config(format!("failed to parse {path}: {e}")))?;
        Ok(Self::new(file.tools))
    }
}

#[async_trait]
impl ToolDiscovery for StaticToolDiscovery {
    async fn discover(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.tools.clone())
    }
}

/// An immutable view of the catalog at one point in time.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Descriptors in discovery order
    pub tools: Vec<ToolDescriptor>,
    refreshed_at: Option<Instant>,
}

impl CatalogSnapshot {
    fn empty() -> Self {
        Self {
            tools: Vec::new(),
            refreshed_at: None,
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        match self.refreshed_at {
            Some(at) => at.elapsed() > ttl,
            None => true,
        }
    }
}

/// The tool catalog: a snapshot pointer refreshed on demand.
///
/// Readers clone the snapshot `Arc`; refresh swaps the pointer under a
/// short write lock. A failed refresh keeps serving the stale snapshot.
pub struct ToolCatalog {
    discovery: Arc<dyn ToolDiscovery>,
    ttl: Duration,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl ToolCatalog {
    /// Create a catalog over a discovery source.
    pub fn new(discovery: Arc<dyn ToolDiscovery>, ttl: Duration) -> Self {
        Self {
            discovery,
            ttl,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::empty())),
        }
    }

    /// Current snapshot, refreshing first if the TTL expired.
    pub async fn snapshot(&self) -> Arc<CatalogSnapshot> {
        let current = self.snapshot.read().clone();
        if !current.is_stale(self.ttl) {
            return current;
        }

        match self.discovery.discover().await {
            Ok(tools) => {
                let fresh = Arc::new(CatalogSnapshot {
                    tools,
                    refreshed_at: Some(Instant::now()),
                });
                *self.snapshot.write() = fresh.clone();
                fresh
            }
            Err(err) => {
                tracing::warn!(error = %err, "tool discovery failed, serving stale catalog");
                current
            }
        }
    }

    /// Force a refresh regardless of TTL.
    pub async fn refresh(&self) -> Result<()> {
        let tools = self.discovery.discover().await?;
        *self.snapshot.write() = Arc::new(CatalogSnapshot {
            tools,
            refreshed_at: Some(Instant::now()),
        });
        Ok(())
    }
}
