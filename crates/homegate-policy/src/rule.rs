//! User-defined device and scene rules
//!
//! Every discriminator on a rule is optional; an unset field matches anything.
//! Rules are scanned in list order and the first match wins, so callers list
//! specific rules before general ones.

use crate::bounds::ValueRange;
use crate::quiet_hours::TimeRange;
use crate::verdict::PolicyDecision;
use homegate_core::{Capability, Device, DeviceCommand, DeviceType, HubResult, Scene, SceneCommand};
use serde::{Deserialize, Serialize};

/// A rule gating device commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_type: Option<Capability>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Fixed decision for matching commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<PolicyDecision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_confirmation: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_range: Option<ValueRange>,

    /// Replaces the global quiet hours for matching commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<Vec<TimeRange>>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DevicePolicy {
    fn default() -> Self {
        Self {
            device_id: None,
            device_type: None,
            capability_type: None,
            action: None,
            decision: None,
            require_confirmation: None,
            allowed_range: None,
            quiet_hours: None,
            enabled: true,
        }
    }
}

impl DevicePolicy {
    /// A rule matching every device command
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn for_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    pub fn for_capability(mut self, capability: Capability) -> Self {
        self.capability_type = Some(capability);
        self
    }

    pub fn for_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_decision(mut self, decision: PolicyDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = Some(true);
        self
    }

    pub fn with_range(mut self, range: ValueRange) -> Self {
        self.allowed_range = Some(range);
        self
    }

    pub fn with_quiet_hours(mut self, ranges: Vec<TimeRange>) -> Self {
        self.quiet_hours = Some(ranges);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether every discriminator this rule sets equals the command's value.
    /// A `device_type` discriminator never matches when the device is unknown.
    pub fn matches(&self, command: &DeviceCommand, device: Option<&Device>) -> bool {
        if let Some(id) = &self.device_id {
            if *id != command.device_id {
                return false;
            }
        }
        if let Some(device_type) = self.device_type {
            if device.map(|d| d.device_type) != Some(device_type) {
                return false;
            }
        }
        if let Some(capability) = self.capability_type {
            if capability != command.capability {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if *action != command.action {
                return false;
            }
        }
        true
    }

    pub fn validate(&self) -> HubResult<()> {
        if let Some(range) = &self.allowed_range {
            let field = match &self.device_id {
                Some(id) => format!("allowed_range of rule for {}", id),
                None => "allowed_range".to_string(),
            };
            range.validate(&field)?;
        }
        for range in self.quiet_hours.iter().flatten() {
            range.validate()?;
        }
        Ok(())
    }
}

/// A rule gating scene activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<PolicyDecision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_confirmation: Option<bool>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ScenePolicy {
    fn default() -> Self {
        Self {
            scene_id: None,
            scene_name: None,
            decision: None,
            require_confirmation: None,
            enabled: true,
        }
    }
}

impl ScenePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_scene(mut self, scene_id: impl Into<String>) -> Self {
        self.scene_id = Some(scene_id.into());
        self
    }

    pub fn for_scene_name(mut self, name: impl Into<String>) -> Self {
        self.scene_name = Some(name.into());
        self
    }

    pub fn with_decision(mut self, decision: PolicyDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = Some(true);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// A `scene_name` discriminator never matches when the scene is unknown.
    pub fn matches(&self, command: &SceneCommand, scene: Option<&Scene>) -> bool {
        if let Some(id) = &self.scene_id {
            if *id != command.scene_id {
                return false;
            }
        }
        if let Some(name) = &self.scene_name {
            if scene.map(|s| s.name.as_str()) != Some(name.as_str()) {
                return false;
            }
        }
        true
    }
}

/// First device rule matching the command
pub fn find_device_policy<'a>(
    policies: &'a [DevicePolicy],
    command: &DeviceCommand,
    device: Option<&Device>,
) -> Option<&'a DevicePolicy> {
    policies.iter().find(|p| p.matches(command, device))
}

/// First scene rule matching the command
pub fn find_scene_policy<'a>(
    policies: &'a [ScenePolicy],
    command: &SceneCommand,
    scene: Option<&Scene>,
) -> Option<&'a ScenePolicy> {
    policies.iter().find(|p| p.matches(command, scene))
}
