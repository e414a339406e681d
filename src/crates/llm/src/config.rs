//! Provider configuration.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a remote, OpenAI-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// Base URL of the API (e.g. `https://api.openai.com/v1`)
    pub base_url: String,

    /// Bearer token for authentication
    pub api_key: String,

    /// Default model when the request carries no override
    pub model: String,

    /// Per-request deadline in seconds
    pub timeout_secs: u64,
}

impl RemoteLlmConfig {
    /// Create a configuration with the default 60 second deadline.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 60,
        }
    }

    /// Create a configuration reading the API key from an environment
    /// variable.
    pub fn from_env(
        api_key_env: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .map_err(|_| LlmError::ApiKeyNotFound(api_key_env.to_string()))?;
        Ok(Self::new(base_url, api_key, model))
    }

    /// Set the request deadline.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The request deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RemoteLlmConfig::new("https://api.openai.com/v1", "sk-test", "gpt-4o");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_from_env_missing_key() {
        let err =
            RemoteLlmConfig::from_env("STEWARD_TEST_MISSING_KEY", "url", "model").unwrap_err();
        assert!(matches!(err, LlmError::ApiKeyNotFound(_)));
    }
}
