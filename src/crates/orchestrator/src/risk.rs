//! Risk assessment of pending operations.
//!
//! Data-driven ordered rules; evaluation is pure and first-match-wins.
//! The built-in table covers the standard operation kinds; deployments can
//! replace it with a YAML file and reload it without a restart.

use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use steward_core::{PendingOperation, RiskLevel};

/// One risk rule. Empty `kinds`/`environments` match any value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRule {
    /// Rule name, for logs and audits
    pub name: String,
    /// Operation kinds this rule applies to
    #[serde(default)]
    pub kinds: Vec<String>,
    /// Environments this rule applies to
    #[serde(default)]
    pub environments: Vec<String>,
    /// Risk assigned on match
    pub risk: RiskLevel,
    /// Whether a matching operation needs human approval
    pub requires_approval: bool,
}

impl RiskRule {
    fn matches(&self, operation: &PendingOperation) -> bool {
        let kind_ok = self.kinds.is_empty() || self.kinds.iter().any(|k| k == &operation.kind);
        let env_ok = self.environments.is_empty()
            || self.environments.iter().any(|e| e == &operation.environment);
        kind_ok && env_ok
    }
}

/// The outcome of evaluating an operation against the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAssessment {
    /// Assigned risk level
    pub risk_level: RiskLevel,
    /// Whether the operation must pause for approval
    pub requires_approval: bool,
}

/// First-match rule evaluator.
#[derive(Debug, Clone)]
pub struct RiskAssessor {
    rules: Vec<RiskRule>,
}

impl RiskAssessor {
    /// The built-in rule table.
    pub fn builtin() -> Self {
        let rules = vec![
            RiskRule {
                name: "prod_deploy".to_string(),
                kinds: vec!["deploy".to_string()],
                environments: vec!["production".to_string()],
                risk: RiskLevel::Critical,
                requires_approval: true,
            },
            RiskRule {
                name: "infra_change".to_string(),
                kinds: vec![
                    "terraform_apply".to_string(),
                    "compose_up".to_string(),
                    "k8s_apply".to_string(),
                ],
                environments: vec!["staging".to_string(), "production".to_string()],
                risk: RiskLevel::High,
                requires_approval: true,
            },
            RiskRule {
                name: "db_migration".to_string(),
                kinds: vec!["db_migrate".to_string()],
                environments: vec![],
                risk: RiskLevel::Medium,
                requires_approval: true,
            },
            RiskRule {
                name: "docs_update".to_string(),
                kinds: vec!["update_docs".to_string()],
                environments: vec![],
                risk: RiskLevel::Low,
                requires_approval: false,
            },
        ];
        Self { rules }
    }

    /// Create an assessor from explicit rules.
    pub fn new(rules: Vec<RiskRule>) -> Self {
        Self { rules }
    }

    /// Load rules from a YAML file with a top-level `rules` list.
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::Config(format!("failed to read {path}: {e}")))?;
        Self::from_yaml(&content)
    }

    /// Parse rules from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct RulesFile {
            rules: Vec<RiskRule>,
        }

        let file: RulesFile = serde_yaml::from_str(content)
            .map_err(|e| OrchestratorError::Config(format!("invalid risk rules: {e}")))?;
        Ok(Self::new(file.rules))
    }

    /// Evaluate an operation. Unknown kinds fall through to the default:
    /// low risk, no approval.
    pub fn assess(&self, operation: &PendingOperation) -> RiskAssessment {
        for rule in &self.rules {
            if rule.matches(operation) {
                tracing::debug!(rule = %rule.name, kind = %operation.kind, "risk rule matched");
                return RiskAssessment {
                    risk_level: rule.risk,
                    requires_approval: rule.requires_approval,
                };
            }
        }
        RiskAssessment {
            risk_level: RiskLevel::Low,
            requires_approval: false,
        }
    }
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn operation(kind: &str, environment: &str) -> PendingOperation {
        PendingOperation {
            kind: kind.to_string(),
            target: "api".to_string(),
            params: json!({}),
            environment: environment.to_string(),
        }
    }

    #[test]
    fn test_prod_deploy_is_critical() {
        let assessor = RiskAssessor::builtin();
        let result = assessor.assess(&operation("deploy", "production"));
        assert_eq!(result.risk_level, RiskLevel::Critical);
        assert!(result.requires_approval);
    }

    #[test]
    fn test_staging_deploy_falls_through_to_default() {
        let assessor = RiskAssessor::builtin();
        let result = assessor.assess(&operation("deploy", "staging"));
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_infra_change_environments() {
        let assessor = RiskAssessor::builtin();

        let result = assessor.assess(&operation("terraform_apply", "staging"));
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result.requires_approval);

        // Dev environments are not gated.
        let result = assessor.assess(&operation("k8s_apply", "dev"));
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_db_migration_any_environment() {
        let assessor = RiskAssessor::builtin();
        let result = assessor.assess(&operation("db_migrate", "dev"));
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert!(result.requires_approval);
    }

    #[test]
    fn test_docs_update_needs_no_approval() {
        let assessor = RiskAssessor::builtin();
        let result = assessor.assess(&operation("update_docs", "production"));
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_unknown_kind_defaults_low() {
        let assessor = RiskAssessor::builtin();
        let result = assessor.assess(&operation("rename_variable", "production"));
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert!(!result.requires_approval);
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            RiskRule {
                name: "everything_high".to_string(),
                kinds: vec![],
                environments: vec![],
                risk: RiskLevel::High,
                requires_approval: true,
            },
            RiskRule {
                name: "unreachable".to_string(),
                kinds: vec!["deploy".to_string()],
                environments: vec![],
                risk: RiskLevel::Low,
                requires_approval: false,
            },
        ];
        let assessor = RiskAssessor::new(rules);
        let result = assessor.assess(&operation("deploy", "production"));
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_rules_load_from_yaml() {
        let yaml = r#"
rules:
  - name: block_prod
    kinds: [deploy]
    environments: [production]
    risk: critical
    requires_approval: true
"#;
        let assessor = RiskAssessor::from_yaml(yaml).unwrap();
        let result = assessor.assess(&operation("deploy", "production"));
        assert_eq!(result.risk_level, RiskLevel::Critical);
    }
}
