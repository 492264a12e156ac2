//! The ordered decision chain
//!
//! Device commands run through these checks, first terminal answer wins:
//!
//! 1. quiet hours (rule windows, else global windows)
//! 2. matched rule: range violation
//! 3. matched rule: disabled
//! 4. matched rule: explicit decision
//! 5. matched rule: confirmation required
//! 6. matched rule with no opinion: allow
//! 7. no rule: global temperature/brightness bounds
//! 8. no rule: risk-based default
//!
//! A range violation overrides whatever the rule itself says, so it is
//! checked before the rule's own decision. Scene commands only run 3-6.

use crate::bounds::{check_allowed_range, check_global_bounds};
use crate::config::PolicyConfig;
use crate::quiet_hours::active_quiet_window;
use crate::risk::RiskLevel;
use crate::rule::{find_device_policy, find_scene_policy};
use crate::verdict::PolicyDecision;
use chrono::NaiveDateTime;
use homegate_core::{Device, DeviceCommand, Scene, SceneCommand};

pub const REASON_QUIET_HOURS: &str = "Action denied during quiet hours";
pub const REASON_POLICY_DISABLED: &str = "Policy is disabled";
pub const REASON_DEVICE_POLICY: &str = "Matched specific device policy";
pub const REASON_DEVICE_CONFIRMATION: &str = "Device policy requires confirmation";
pub const REASON_SCENE_POLICY: &str = "Matched specific scene policy";
pub const REASON_SCENE_CONFIRMATION: &str = "Scene policy requires confirmation";
pub const REASON_HIGH_RISK_DISABLED: &str = "High-risk actions are disabled";
pub const REASON_HIGH_RISK_CONFIRMATION: &str = "High-risk action requires confirmation";
pub const REASON_DEFAULT_ALLOW: &str = "Action allowed";

/// A terminal answer from the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub decision: PolicyDecision,
    pub reason: String,
}

impl Outcome {
    fn new(decision: PolicyDecision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }

    fn allow(reason: impl Into<String>) -> Self {
        Self::new(PolicyDecision::Allow, reason)
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self::new(PolicyDecision::Deny, reason)
    }

    fn confirm(reason: impl Into<String>) -> Self {
        Self::new(PolicyDecision::RequireConfirmation, reason)
    }
}

/// Steps 3-5, shared by device and scene rules
fn rule_opinion(
    enabled: bool,
    decision: Option<PolicyDecision>,
    require_confirmation: Option<bool>,
    matched_reason: &str,
    confirmation_reason: &str,
) -> Option<Outcome> {
    if !enabled {
        return Some(Outcome::deny(REASON_POLICY_DISABLED));
    }
    if let Some(decision) = decision {
        return Some(Outcome::new(decision, matched_reason));
    }
    if require_confirmation == Some(true) {
        return Some(Outcome::confirm(confirmation_reason));
    }
    None
}

pub fn decide_device(
    config: &PolicyConfig,
    command: &DeviceCommand,
    device: Option<&Device>,
    risk_level: RiskLevel,
    local_now: NaiveDateTime,
) -> Outcome {
    let settings = &config.global_settings;
    let policy = find_device_policy(&config.device_policies, command, device);

    if settings.enable_quiet_hours {
        if let Some(window) = active_quiet_window(config.quiet_hours_for(policy), local_now) {
            tracing::debug!(device_id = %command.device_id, window = %window, "Inside quiet hours");
            return Outcome::deny(REASON_QUIET_HOURS);
        }
    }

    if let Some(policy) = policy {
        if let Some(range) = &policy.allowed_range {
            if let Some(violation) = check_allowed_range(range, &command.parameters) {
                return Outcome::deny(format!("Value out of allowed range: {}", violation));
            }
        }

        return rule_opinion(
            policy.enabled,
            policy.decision,
            policy.require_confirmation,
            REASON_DEVICE_POLICY,
            REASON_DEVICE_CONFIRMATION,
        )
        .unwrap_or_else(|| Outcome::allow(REASON_DEVICE_POLICY));
    }

    if let Some(violation) = check_global_bounds(
        settings.temperature_bounds.as_ref(),
        settings.brightness_bounds.as_ref(),
        &command.parameters,
    ) {
        return Outcome::deny(format!("Value out of bounds: {}", violation));
    }

    if risk_level.is_high() {
        if !settings.allow_high_risk_actions {
            return Outcome::deny(REASON_HIGH_RISK_DISABLED);
        }
        if settings.require_confirmation_for_high_risk {
            return Outcome::confirm(REASON_HIGH_RISK_CONFIRMATION);
        }
    }

    Outcome::allow(REASON_DEFAULT_ALLOW)
}

pub fn decide_scene(config: &PolicyConfig, command: &SceneCommand, scene: Option<&Scene>) -> Outcome {
    match find_scene_policy(&config.scene_policies, command, scene) {
        Some(policy) => rule_opinion(
            policy.enabled,
            policy.decision,
            policy.require_confirmation,
            REASON_SCENE_POLICY,
            REASON_SCENE_CONFIRMATION,
        )
        .unwrap_or_else(|| Outcome::allow(REASON_SCENE_POLICY)),
        None => Outcome::allow(REASON_DEFAULT_ALLOW),
    }
}
