//! Server configuration.
//!
//! Loaded from a TOML file (path via `STEWARD_CONFIG`, default
//! `config/steward.toml`), with secrets taken from the environment so they
//! never live in the file. A missing file yields the defaults, which is
//! what tests and local development use.

use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or `:memory:`
    pub path: String,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "steward.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// The sqlx connection string.
    pub fn url(&self) -> String {
        if self.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", self.path)
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Maximum node transitions per run
    pub per_run_hop_limit: u32,
    /// Maximum LLM round-trips per agent invocation
    pub per_node_hop_limit: u32,
    /// Non-latest checkpoints older than this are pruned
    pub checkpoint_ttl_seconds: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            per_run_hop_limit: 25,
            per_node_hop_limit: 8,
            checkpoint_ttl_seconds: 7 * 24 * 3600,
        }
    }
}

/// Approval lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Pending requests older than this expire
    pub timeout_seconds: u64,
    /// Interval of the expiry sweep
    pub sweep_interval_seconds: u64,
    /// Interval of the fallback tracker poll
    pub poll_interval_seconds: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 24 * 3600,
            sweep_interval_seconds: 300,
            poll_interval_seconds: 120,
        }
    }
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat-completions endpoint
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Default model
    pub default_model: String,
    /// Per-request deadline
    pub timeout_seconds: u64,
    /// Model overrides per agent
    #[serde(default)]
    pub per_agent_models: HashMap<String, String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key_env: "STEWARD_LLM_API_KEY".to_string(),
            default_model: "gpt-4o".to_string(),
            timeout_seconds: 60,
            per_agent_models: HashMap::new(),
        }
    }
}

/// Tool catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Catalog refresh TTL
    pub catalog_ttl_seconds: u64,
    /// Hard cap on tools bound per invocation
    pub max_tools_per_invocation: usize,
    /// Loading strategy overrides per agent (minimal, agent_profile,
    /// progressive, full)
    #[serde(default)]
    pub per_agent_strategy: HashMap<String, String>,
    /// Optional TOML file describing the static catalog
    #[serde(default)]
    pub catalog_path: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            catalog_ttl_seconds: 300,
            max_tools_per_invocation: 60,
            per_agent_strategy: HashMap::new(),
            catalog_path: None,
        }
    }
}

/// Risk assessor settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RiskConfig {
    /// Optional YAML rules file; built-in rules are used when absent
    pub rules_path: Option<String>,
}

/// Issue tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the tracker API
    pub base_url: String,
    /// Environment variable holding the API token
    pub api_token_env: String,
    /// Environment variable holding the webhook HMAC secret
    pub webhook_secret_env: String,
    /// Per-request deadline
    pub timeout_seconds: u64,
    /// Tracker states mapped to an approved decision
    pub approved_states: Vec<String>,
    /// Tracker states mapped to a rejected decision
    pub rejected_states: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            api_token_env: "STEWARD_TRACKER_TOKEN".to_string(),
            webhook_secret_env: "STEWARD_TRACKER_WEBHOOK_SECRET".to_string(),
            timeout_seconds: 15,
            approved_states: vec!["Done".to_string(), "Approved".to_string()],
            rejected_states: vec!["Canceled".to_string(), "Rejected".to_string()],
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    /// HTTP listener
    #[serde(default)]
    pub http: HttpConfig,
    /// Database
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Engine tunables
    #[serde(default)]
    pub engine: EngineSettings,
    /// Approval lifecycle
    #[serde(default)]
    pub approval: ApprovalConfig,
    /// LLM provider
    #[serde(default)]
    pub llm: LlmConfig,
    /// Tool catalog
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Risk rules
    #[serde(default)]
    pub risk: RiskConfig,
    /// Issue tracker
    #[serde(default)]
    pub tracker: TrackerConfig,
}

impl ServerConfig {
    /// Load configuration from `STEWARD_CONFIG` or the default path.
    ///
    /// A missing file yields the defaults; a present but invalid file is an
    /// error.
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("STEWARD_CONFIG").unwrap_or_else(|_| "config/steward.toml".to_string());
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            OrchestratorError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// The tracker webhook secret from the configured environment variable.
    pub fn webhook_secret(&self) -> Option<String> {
        std::env::var(&self.tracker.webhook_secret_env).ok()
    }

    /// The LLM API key from the configured environment variable.
    pub fn llm_api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env).ok()
    }

    /// The tracker API token from the configured environment variable.
    pub fn tracker_token(&self) -> Option<String> {
        std::env::var(&self.tracker.api_token_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.engine.per_run_hop_limit, 25);
        assert_eq!(config.engine.per_node_hop_limit, 8);
        assert_eq!(config.approval.timeout_seconds, 24 * 3600);
        assert_eq!(config.tools.max_tools_per_invocation, 60);
        assert_eq!(config.tracker.timeout_seconds, 15);
        assert_eq!(config.llm.timeout_seconds, 60);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let raw = r#"
            [engine]
            per_run_hop_limit = 10
            per_node_hop_limit = 4
            checkpoint_ttl_seconds = 3600

            [tracker]
            base_url = "https://tracker.example.com"
            api_token_env = "T"
            webhook_secret_env = "S"
            timeout_seconds = 5
            approved_states = ["Done"]
            rejected_states = ["Canceled"]
        "#;
        let config: ServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.engine.per_run_hop_limit, 10);
        assert_eq!(config.tracker.approved_states, vec!["Done"]);
        // Untouched sections fall back to defaults.
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.tools.catalog_ttl_seconds, 300);
    }

    #[test]
    fn test_memory_database_url() {
        let db = DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
        };
        assert_eq!(db.url(), "sqlite::memory:");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ServerConfig::load_from("/nonexistent/steward.toml").unwrap();
        assert_eq!(config.http.port, 8080);
    }
}
