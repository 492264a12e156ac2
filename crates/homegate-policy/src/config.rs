//! Engine configuration
//!
//! A full `PolicyConfig` is always built by merging a partial
//! `PolicyConfigUpdate` over the defaults. Global settings merge field by
//! field; rule lists are replaced wholesale.

use crate::bounds::Bounds;
use crate::quiet_hours::TimeRange;
use crate::risk::RiskLevel;
use crate::rule::{DevicePolicy, ScenePolicy};
use homegate_core::{HubError, HubResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUDIT_LOG_MAX_ENTRIES: usize = 1000;
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u32 = 300;

/// Hub-wide switches and limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    pub allow_high_risk_actions: bool,
    pub require_confirmation_for_high_risk: bool,
    pub enable_quiet_hours: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<Vec<TimeRange>>,
    pub enable_audit_log: bool,
    pub audit_log_max_entries: usize,
    pub confirmation_timeout_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_bounds: Option<Bounds>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            allow_high_risk_actions: false,
            require_confirmation_for_high_risk: true,
            enable_quiet_hours: false,
            quiet_hours: None,
            enable_audit_log: true,
            audit_log_max_entries: DEFAULT_AUDIT_LOG_MAX_ENTRIES,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            temperature_bounds: None,
            brightness_bounds: None,
        }
    }
}

impl GlobalSettings {
    /// Merge with a partial update (update takes precedence)
    pub fn merge(&mut self, other: &GlobalSettingsUpdate) {
        if let Some(v) = other.allow_high_risk_actions { self.allow_high_risk_actions = v; }
        if let Some(v) = other.require_confirmation_for_high_risk { self.require_confirmation_for_high_risk = v; }
        if let Some(v) = other.enable_quiet_hours { self.enable_quiet_hours = v; }
        if other.quiet_hours.is_some() { self.quiet_hours = other.quiet_hours.clone(); }
        if let Some(v) = other.enable_audit_log { self.enable_audit_log = v; }
        if let Some(v) = other.audit_log_max_entries { self.audit_log_max_entries = v; }
        if let Some(v) = other.confirmation_timeout_secs { self.confirmation_timeout_secs = v; }
        if other.temperature_bounds.is_some() { self.temperature_bounds = other.temperature_bounds; }
        if other.brightness_bounds.is_some() { self.brightness_bounds = other.brightness_bounds; }
    }

    pub fn validate(&self) -> HubResult<()> {
        if self.audit_log_max_entries == 0 {
            return Err(HubError::ZeroAuditCapacity);
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(HubError::ZeroConfirmationTimeout);
        }
        for range in self.quiet_hours.iter().flatten() {
            range.validate()?;
        }
        if let Some(bounds) = &self.temperature_bounds {
            bounds.validate("temperature_bounds")?;
        }
        if let Some(bounds) = &self.brightness_bounds {
            bounds.validate("brightness_bounds")?;
        }
        Ok(())
    }
}

/// Partial global settings; unset fields keep their current value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_high_risk_actions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_confirmation_for_high_risk: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_quiet_hours: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<Vec<TimeRange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_audit_log: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log_max_entries: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_bounds: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness_bounds: Option<Bounds>,
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Risk assigned to device commands the classifier does not single out.
    ///
    /// At the default `SAFE` unrecognized commands are safe. Raising it to
    /// `MEDIUM` or `HIGH` reclassifies every such command, including plain
    /// switch toggles, so with `HIGH` they go through the high-risk path
    /// (denied unless high-risk actions are allowed). Scene risk is unaffected.
    pub default_risk_level: RiskLevel,
    /// Device rules, most specific first
    pub device_policies: Vec<DevicePolicy>,
    /// Scene rules, most specific first
    pub scene_policies: Vec<ScenePolicy>,
    pub global_settings: GlobalSettings,
}

/// Partial configuration used at construction and for runtime updates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_policies: Option<Vec<DevicePolicy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_policies: Option<Vec<ScenePolicy>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_settings: Option<GlobalSettingsUpdate>,
}

impl PolicyConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_policies(mut self, policies: Vec<DevicePolicy>) -> Self {
        self.device_policies = Some(policies);
        self
    }

    pub fn scene_policies(mut self, policies: Vec<ScenePolicy>) -> Self {
        self.scene_policies = Some(policies);
        self
    }

    pub fn global_settings(mut self, settings: GlobalSettingsUpdate) -> Self {
        self.global_settings = Some(settings);
        self
    }

    pub fn default_risk_level(mut self, level: RiskLevel) -> Self {
        self.default_risk_level = Some(level);
        self
    }
}

impl From<PolicyConfig> for PolicyConfigUpdate {
    fn from(config: PolicyConfig) -> Self {
        let g = config.global_settings;
        Self {
            default_risk_level: Some(config.default_risk_level),
            device_policies: Some(config.device_policies),
            scene_policies: Some(config.scene_policies),
            global_settings: Some(GlobalSettingsUpdate {
                allow_high_risk_actions: Some(g.allow_high_risk_actions),
                require_confirmation_for_high_risk: Some(g.require_confirmation_for_high_risk),
                enable_quiet_hours: Some(g.enable_quiet_hours),
                quiet_hours: g.quiet_hours,
                enable_audit_log: Some(g.enable_audit_log),
                audit_log_max_entries: Some(g.audit_log_max_entries),
                confirmation_timeout_secs: Some(g.confirmation_timeout_secs),
                temperature_bounds: g.temperature_bounds,
                brightness_bounds: g.brightness_bounds,
            }),
        }
    }
}

impl PolicyConfig {
    /// Merge a partial config over the defaults and validate the result
    pub fn from_update(update: PolicyConfigUpdate) -> HubResult<Self> {
        let mut config = Self::default();
        config.merge(update);
        config.validate()?;
        Ok(config)
    }

    /// Apply a partial update in place. Does not validate.
    pub fn merge(&mut self, update: PolicyConfigUpdate) {
        if let Some(level) = update.default_risk_level {
            self.default_risk_level = level;
        }
        if let Some(policies) = update.device_policies {
            self.device_policies = policies;
        }
        if let Some(policies) = update.scene_policies {
            self.scene_policies = policies;
        }
        if let Some(settings) = &update.global_settings {
            self.global_settings.merge(settings);
        }
    }

    pub fn validate(&self) -> HubResult<()> {
        self.global_settings.validate()?;
        for policy in &self.device_policies {
            policy.validate()?;
        }
        Ok(())
    }

    /// Parse a (possibly partial) JSON config and merge it over the defaults
    pub fn from_json_str(text: &str) -> HubResult<Self> {
        let update: PolicyConfigUpdate =
            serde_json::from_str(text).map_err(|e| HubError::ConfigParse(e.to_string()))?;
        Self::from_update(update)
    }

    /// Parse a (possibly partial) YAML config and merge it over the defaults
    pub fn from_yaml_str(text: &str) -> HubResult<Self> {
        let update: PolicyConfigUpdate =
            serde_yaml::from_str(text).map_err(|e| HubError::ConfigParse(e.to_string()))?;
        Self::from_update(update)
    }

    /// Quiet hours that apply to a command matched by `policy`
    pub fn quiet_hours_for<'a>(&'a self, policy: Option<&'a DevicePolicy>) -> &'a [TimeRange] {
        policy
            .and_then(|p| p.quiet_hours.as_deref())
            .or(self.global_settings.quiet_hours.as_deref())
            .unwrap_or(&[])
    }
}
