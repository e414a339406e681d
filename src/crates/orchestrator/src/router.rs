//! Intent and command routing.
//!
//! Two-stage classification of an inbound user message: slash commands are
//! parsed first; everything else goes through the lexical intent
//! classifier. The lexical classifier is the single canonical one: its
//! confidence scale is the only one in play, and the session-mode
//! thresholds apply to it directly.

use regex::Regex;
use serde::Serialize;
use steward_core::SessionMode;

/// Confidence required to classify as a task in ask mode.
const ASK_TASK_THRESHOLD: f64 = 0.85;
/// Confidence required to classify as a task in agent mode.
const AGENT_TASK_THRESHOLD: f64 = 0.60;

/// A recognised slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/execute <task>`: force task submission
    Execute(String),
    /// `/help`
    Help,
    /// `/status`
    Status,
    /// `/cancel`
    Cancel,
}

/// Parse a leading slash command. Unknown slash prefixes are treated as
/// plain text.
pub fn parse_command(message: &str) -> Option<Command> {
    let trimmed = message.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (trimmed, ""),
    };

    match command {
        "/execute" => Some(Command::Execute(rest.to_string())),
        "/help" => Some(Command::Help),
        "/status" => Some(Command::Status),
        "/cancel" => Some(Command::Cancel),
        _ => None,
    }
}

/// Classified intent of a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// The user wants work done
    TaskSubmission,
    /// A question or chat turn, no side effects
    GeneralQuery,
    /// A question about run progress
    StatusQuery,
    /// Ambiguous; needs a confirming question
    Clarification,
    /// An approve/reject expressed in chat
    ApprovalDecision,
}

/// Classification result.
#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    /// Category of the message
    pub kind: IntentKind,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Leading task verb, when one was recognised
    pub task_type: Option<String>,
    /// Short rationale, for logs and the redirect payload
    pub reasoning: String,
}

/// Lexical intent classifier.
pub struct IntentRouter {
    greeting: Regex,
    question: Regex,
    status: Regex,
    approval: Regex,
    imperative_prefix: Regex,
    imperative_anywhere: Regex,
}

impl IntentRouter {
    /// Build the classifier. The patterns are static; compilation cannot
    /// fail at runtime inputs.
    pub fn new() -> Self {
        Self {
            greeting: Regex::new(r"(?i)^(hi|hello|hey|howdy|thanks|thank you)\b").unwrap(),
            question: Regex::new(
                r"(?i)^(what|how|why|when|where|who|which|can you|could you|do you|does|is|are)\b",
            )
            .unwrap(),
            status: Regex::new(r"(?i)\b(status|progress|how('s| is) it going|where are we)\b")
                .unwrap(),
            approval: Regex::new(r"(?i)^(approve[d]?|reject(ed)?|lgtm|ship it|denied)\b").unwrap(),
            imperative_prefix: Regex::new(
                r"(?i)^(implement|add|fix|deploy|create|build|write|update|refactor|migrate|configure|set ?up|install|remove|delete|run|release|apply|provision)\b",
            )
            .unwrap(),
            imperative_anywhere: Regex::new(
                r"(?i)\b(implement|fix|deploy|refactor|migrate|provision|release)\b",
            )
            .unwrap(),
        }
    }

    /// Classify a message under the session mode's task threshold.
    pub fn classify(&self, message: &str, mode: SessionMode) -> Intent {
        let trimmed = message.trim();
        let raw = self.score(trimmed);

        // The mode biases only the task threshold: a below-threshold task
        // candidate degrades to a clarification rather than silently
        // becoming a query.
        if raw.kind == IntentKind::TaskSubmission {
            let threshold = match mode {
                SessionMode::Ask => ASK_TASK_THRESHOLD,
                SessionMode::Agent => AGENT_TASK_THRESHOLD,
            };
            if raw.confidence < threshold {
                return Intent {
                    kind: IntentKind::Clarification,
                    confidence: raw.confidence,
                    task_type: raw.task_type,
                    reasoning: format!(
                        "possible task below the {threshold:.2} threshold for {mode:?} mode"
                    ),
                };
            }
        }

        raw
    }

    fn score(&self, message: &str) -> Intent {
        if self.greeting.is_match(message) {
            return Intent {
                kind: IntentKind::GeneralQuery,
                confidence: 0.95,
                task_type: None,
                reasoning: "greeting".to_string(),
            };
        }
        if self.approval.is_match(message) {
            return Intent {
                kind: IntentKind::ApprovalDecision,
                confidence: 0.9,
                task_type: None,
                reasoning: "approval phrasing".to_string(),
            };
        }
        if self.status.is_match(message) {
            return Intent {
                kind: IntentKind::StatusQuery,
                confidence: 0.85,
                task_type: None,
                reasoning: "status phrasing".to_string(),
            };
        }
        if let Some(found) = self.imperative_prefix.find(message) {
            return Intent {
                kind: IntentKind::TaskSubmission,
                confidence: 0.9,
                task_type: Some(found.as_str().to_lowercase()),
                reasoning: "imperative verb prefix".to_string(),
            };
        }
        if self.question.is_match(message) || message.ends_with('?') {
            return Intent {
                kind: IntentKind::GeneralQuery,
                confidence: 0.9,
                task_type: None,
                reasoning: "question form".to_string(),
            };
        }
        if message.split_whitespace().count() < 4 {
            return Intent {
                kind: IntentKind::GeneralQuery,
                confidence: 0.7,
                task_type: None,
                reasoning: "short message".to_string(),
            };
        }
        if let Some(found) = self.imperative_anywhere.find(message) {
            return Intent {
                kind: IntentKind::TaskSubmission,
                confidence: 0.7,
                task_type: Some(found.as_str().to_lowercase()),
                reasoning: "imperative verb mid-sentence".to_string(),
            };
        }
        Intent {
            kind: IntentKind::GeneralQuery,
            confidence: 0.6,
            task_type: None,
            reasoning: "no task signal".to_string(),
        }
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(
            parse_command("/execute add retries to login"),
            Some(Command::Execute("add retries to login".to_string()))
        );
        assert_eq!(parse_command("/help"), Some(Command::Help));
        assert_eq!(parse_command("  /status  "), Some(Command::Status));
        assert_eq!(parse_command("/cancel"), Some(Command::Cancel));
    }

    #[test]
    fn test_unknown_slash_is_text() {
        assert_eq!(parse_command("/frobnicate now"), None);
        assert_eq!(parse_command("plain message"), None);
    }

    #[test]
    fn test_execute_without_args() {
        assert_eq!(parse_command("/execute"), Some(Command::Execute(String::new())));
    }

    #[test]
    fn test_greeting_and_question_are_queries() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("hello there", SessionMode::Ask).kind,
            IntentKind::GeneralQuery
        );
        assert_eq!(
            router.classify("what can you do?", SessionMode::Ask).kind,
            IntentKind::GeneralQuery
        );
    }

    #[test]
    fn test_imperative_prefix_is_task_in_both_modes() {
        let router = IntentRouter::new();
        for mode in [SessionMode::Ask, SessionMode::Agent] {
            let intent = router.classify("deploy v2.5 to production", mode);
            assert_eq!(intent.kind, IntentKind::TaskSubmission, "mode {mode:?}");
            assert!(intent.confidence >= 0.85);
            assert_eq!(intent.task_type.as_deref(), Some("deploy"));
        }
    }

    #[test]
    fn test_mode_thresholds_bias_weak_tasks() {
        let router = IntentRouter::new();
        // Mid-sentence imperative scores 0.7: task in agent mode, needs
        // clarification in ask mode.
        let message = "i think we should probably deploy the new build soon";
        assert_eq!(
            router.classify(message, SessionMode::Agent).kind,
            IntentKind::TaskSubmission
        );
        assert_eq!(
            router.classify(message, SessionMode::Ask).kind,
            IntentKind::Clarification
        );
    }

    #[test]
    fn test_status_query() {
        let router = IntentRouter::new();
        assert_eq!(
            router
                .classify("status of the deploy workflow", SessionMode::Agent)
                .kind,
            IntentKind::StatusQuery
        );
    }

    #[test]
    fn test_approval_phrasing() {
        let router = IntentRouter::new();
        assert_eq!(
            router.classify("approved, go ahead", SessionMode::Agent).kind,
            IntentKind::ApprovalDecision
        );
    }

    #[test]
    fn test_update_readme_is_task() {
        let router = IntentRouter::new();
        let intent = router.classify("update README with new env var", SessionMode::Agent);
        assert_eq!(intent.kind, IntentKind::TaskSubmission);
    }
}
