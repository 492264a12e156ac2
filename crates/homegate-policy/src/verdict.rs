//! Decisions and results returned to the tool-call layer
//!
//! `Verdict` carries the confirmation token inside the REQUIRE_CONFIRMATION
//! variant, so a confirmation result without a token cannot be built.

use crate::confirmation::ConfirmationToken;
use crate::risk::RiskLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The engine's verdict on a command, without attached data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyDecision {
    #[serde(alias = "allow")]
    Allow,
    #[serde(alias = "deny")]
    Deny,
    #[serde(alias = "require_confirmation")]
    RequireConfirmation,
}

impl PolicyDecision {
    /// Anything but DENY counts as a successful evaluation in the audit log
    pub fn is_success(&self) -> bool {
        !matches!(self, PolicyDecision::Deny)
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PolicyDecision::Allow => write!(f, "ALLOW"),
            PolicyDecision::Deny => write!(f, "DENY"),
            PolicyDecision::RequireConfirmation => write!(f, "REQUIRE_CONFIRMATION"),
        }
    }
}

/// Decision plus the data that belongs to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Allow,
    Deny,
    RequireConfirmation {
        confirmation_token: ConfirmationToken,
    },
}

impl Verdict {
    pub fn decision(&self) -> PolicyDecision {
        match self {
            Verdict::Allow => PolicyDecision::Allow,
            Verdict::Deny => PolicyDecision::Deny,
            Verdict::RequireConfirmation { .. } => PolicyDecision::RequireConfirmation,
        }
    }
}

/// Result of evaluating a device or scene command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyResult {
    #[serde(flatten)]
    pub verdict: Verdict,
    pub risk_level: RiskLevel,
    pub reason: String,
}

impl PolicyResult {
    pub fn new(verdict: Verdict, risk_level: RiskLevel, reason: impl Into<String>) -> Self {
        Self {
            verdict,
            risk_level,
            reason: reason.into(),
        }
    }

    pub fn decision(&self) -> PolicyDecision {
        self.verdict.decision()
    }

    /// Token to pass to `confirm_action` / `deny_action`
    pub fn confirmation_token(&self) -> Option<&ConfirmationToken> {
        match &self.verdict {
            Verdict::RequireConfirmation { confirmation_token } => Some(confirmation_token),
            _ => None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self.verdict, Verdict::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self.verdict, Verdict::Deny)
    }

    pub fn needs_confirmation(&self) -> bool {
        matches!(self.verdict, Verdict::RequireConfirmation { .. })
    }
}

impl fmt::Display for PolicyResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.decision(), self.risk_level, self.reason)?;
        if let Some(token) = self.confirmation_token() {
            write!(f, " (token {})", token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_serializes_flat() {
        let token = ConfirmationToken::from("confirm_abc");
        let result = PolicyResult::new(
            Verdict::RequireConfirmation {
                confirmation_token: token.clone(),
            },
            RiskLevel::High,
            "High-risk action requires confirmation",
        );

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "decision": "REQUIRE_CONFIRMATION",
                "confirmation_token": "confirm_abc",
                "risk_level": "HIGH",
                "reason": "High-risk action requires confirmation"
            })
        );

        let back: PolicyResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.confirmation_token(), Some(&token));
    }

    #[test]
    fn test_allow_has_no_token() {
        let result = PolicyResult::new(Verdict::Allow, RiskLevel::Safe, "Allowed");
        assert!(result.is_allowed());
        assert!(result.confirmation_token().is_none());
        assert_eq!(result.decision(), PolicyDecision::Allow);
        assert_eq!(result.to_string(), "ALLOW [SAFE]: Allowed");
    }

    #[test]
    fn test_decision_aliases() {
        let d: PolicyDecision = serde_json::from_str("\"deny\"").unwrap();
        assert_eq!(d, PolicyDecision::Deny);
        let d: PolicyDecision = serde_json::from_str("\"REQUIRE_CONFIRMATION\"").unwrap();
        assert_eq!(d, PolicyDecision::RequireConfirmation);
        assert!(!PolicyDecision::Deny.is_success());
        assert!(PolicyDecision::RequireConfirmation.is_success());
    }
}
