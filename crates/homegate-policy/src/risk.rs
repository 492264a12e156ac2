//! Risk classification for commands
//!
//! Risk only drives the decision when no rule matches; otherwise it is
//! reported alongside the decision and recorded in the audit log.

use homegate_core::{Capability, Device, DeviceCommand, DeviceType, Scene, SceneCommand};
use serde::{Deserialize, Serialize};

/// Risk level of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Lights, switches, media
    #[default]
    Safe = 0,
    /// Climate control
    Medium = 1,
    /// Physical security: unlocking doors, disarming alarms
    High = 2,
}

impl RiskLevel {
    /// Check if this risk level falls under the high-risk global settings
    pub fn is_high(&self) -> bool {
        matches!(self, RiskLevel::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "SAFE"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Classify a device command.
///
/// `fallback` is returned for commands that are neither high nor medium risk;
/// the engine passes the configured `default_risk_level`.
pub fn classify_device_risk(
    command: &DeviceCommand,
    device: Option<&Device>,
    fallback: RiskLevel,
) -> RiskLevel {
    let action = command.action.as_str();

    let unlocks = action == "unlock"
        && (command.capability == Capability::Lock
            || device.is_some_and(|d| d.device_type == DeviceType::Lock));
    let disarms = command.capability == Capability::Alarm && action == "disarm";

    if unlocks || disarms {
        return RiskLevel::High;
    }

    match command.capability {
        Capability::Thermostat | Capability::Climate => RiskLevel::Medium,
        _ => fallback,
    }
}

/// Classify a scene activation. Scenes are always treated as safe; rules are
/// the only way to gate them.
pub fn classify_scene_risk(_command: &SceneCommand, _scene: Option<&Scene>) -> RiskLevel {
    RiskLevel::Safe
}
