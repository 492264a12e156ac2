//! Policy engine: the only entry point the tool layer calls
//!
//! All operations are synchronous and take one lock, so an evaluation that
//! mints a token and writes its audit entry is atomic with respect to the
//! background sweep. Resolving a token that the sweep already removed is a
//! plain "not found".

use crate::audit::{AuditEntry, AuditLog, AuditStats};
use crate::config::{PolicyConfig, PolicyConfigUpdate};
use crate::confirmation::{ConfirmationRegistry, PendingConfirmation, Resolution};
use crate::evaluation::{decide_device, decide_scene, Outcome};
use crate::risk::{classify_device_risk, classify_scene_risk, RiskLevel};
use crate::sweeper::{Sweeper, DEFAULT_SWEEP_INTERVAL};
use crate::verdict::{PolicyDecision, PolicyResult, Verdict};
use chrono::{DateTime, Utc};
use homegate_core::{
    Clock, Command, Device, DeviceCommand, HubResult, Scene, SceneCommand, SystemClock,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tool name recorded for device evaluations when the caller gives none
pub const DEVICE_TOOL: &str = "control_device";
/// Tool name recorded for scene evaluations
pub const SCENE_TOOL: &str = "activate_scene";
pub const CONFIRM_TOOL: &str = "confirm_action";
pub const DENY_TOOL: &str = "deny_action";

struct EngineState {
    config: PolicyConfig,
    registry: ConfirmationRegistry,
    audit: AuditLog,
}

impl EngineState {
    fn new(config: PolicyConfig) -> Self {
        let mut audit = AuditLog::new(config.global_settings.audit_log_max_entries);
        audit.set_enabled(config.global_settings.enable_audit_log);
        Self {
            config,
            registry: ConfirmationRegistry::new(),
            audit,
        }
    }

    fn confirmation_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.config.global_settings.confirmation_timeout_secs))
    }
}

/// State shared between the engine and its sweeper
pub(crate) struct EngineShared {
    state: Mutex<EngineState>,
    clock: Arc<dyn Clock>,
}

impl EngineShared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove expired confirmations without auditing them
    pub(crate) fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.lock().registry.sweep_expired(now);
        if !removed.is_empty() {
            info!(removed = removed.len(), "Swept expired confirmations");
        }
        removed.len()
    }
}

/// Command authorization engine
pub struct PolicyEngine {
    shared: Arc<EngineShared>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl PolicyEngine {
    /// Build an engine on the system clock. The sweeper is not started.
    pub fn new(config: PolicyConfigUpdate) -> HubResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an engine on an injected clock. The sweeper is not started.
    pub fn with_clock(config: PolicyConfigUpdate, clock: Arc<dyn Clock>) -> HubResult<Self> {
        let config = PolicyConfig::from_update(config)?;
        debug!(
            device_policies = config.device_policies.len(),
            scene_policies = config.scene_policies.len(),
            "Policy engine configured"
        );
        Ok(Self {
            shared: Arc::new(EngineShared {
                state: Mutex::new(EngineState::new(config)),
                clock,
            }),
            sweeper: Mutex::new(None),
        })
    }

    /// Build an engine and start sweeping expired confirmations every
    /// `DEFAULT_SWEEP_INTERVAL`. Must be called inside a Tokio runtime.
    pub fn spawn(config: PolicyConfigUpdate) -> HubResult<Self> {
        let engine = Self::new(config)?;
        engine.start_sweeper(DEFAULT_SWEEP_INTERVAL)?;
        Ok(engine)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.shared.lock()
    }

    fn sweeper(&self) -> MutexGuard<'_, Option<Sweeper>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Decide whether a device command may run
    pub fn evaluate_device_command(
        &self,
        command: &DeviceCommand,
        device: Option<&Device>,
        tool_name: Option<&str>,
    ) -> PolicyResult {
        let now = self.shared.clock.now();
        let local_now = self.shared.clock.local_now();
        let mut state = self.lock();

        let risk_level = classify_device_risk(command, device, state.config.default_risk_level);
        let outcome = decide_device(&state.config, command, device, risk_level, local_now);

        finish(
            &mut state,
            Command::Device(command.clone()),
            tool_name.unwrap_or(DEVICE_TOOL),
            risk_level,
            outcome,
            now,
        )
    }

    /// Decide whether a scene may be activated
    pub fn evaluate_scene_command(&self, command: &SceneCommand, scene: Option<&Scene>) -> PolicyResult {
        let now = self.shared.clock.now();
        let mut state = self.lock();

        let risk_level = classify_scene_risk(command, scene);
        let outcome = decide_scene(&state.config, command, scene);

        finish(
            &mut state,
            Command::Scene(command.clone()),
            SCENE_TOOL,
            risk_level,
            outcome,
            now,
        )
    }

    // =========================================================================
    // Confirmation workflow
    // =========================================================================

    /// Approve a pending confirmation. Returns the record once; `None` for
    /// unknown, already resolved, or expired tokens.
    pub fn confirm_action(&self, token: &str, confirmed_by: Option<&str>) -> Option<PendingConfirmation> {
        let now = self.shared.clock.now();
        let mut state = self.lock();

        match state.registry.take(token, now) {
            Resolution::NotFound => {
                debug!(token, "Confirmation not found");
                None
            }
            Resolution::Expired(record) => {
                info!(token, expired_at = %record.expires_at, "Confirmation expired before approval");
                None
            }
            Resolution::Resolved(record) => {
                let entry = AuditEntry::new(
                    CONFIRM_TOOL,
                    record.command.clone(),
                    PolicyDecision::Allow,
                    record.risk_level,
                    now,
                )
                .with_reason(format!("Confirmed: {}", record.reason))
                .with_confirmed_by(confirmed_by.map(str::to_string));
                state.audit.log(entry);

                info!(token, confirmed_by = confirmed_by.unwrap_or("-"), "Action confirmed");
                Some(record)
            }
        }
    }

    /// Reject a pending confirmation. Returns false if the token is unknown.
    pub fn deny_action(&self, token: &str) -> bool {
        let now = self.shared.clock.now();
        let mut state = self.lock();

        let Some(record) = state.registry.remove(token) else {
            debug!(token, "Confirmation not found");
            return false;
        };

        let entry = AuditEntry::new(
            DENY_TOOL,
            record.command,
            PolicyDecision::Deny,
            record.risk_level,
            now,
        )
        .with_reason(format!("Denied: {}", record.reason));
        state.audit.log(entry);

        info!(token, "Action denied");
        true
    }

    pub fn get_pending_confirmations(&self) -> Vec<PendingConfirmation> {
        self.lock().registry.list()
    }

    pub fn get_pending_confirmation(&self, token: &str) -> Option<PendingConfirmation> {
        self.lock().registry.get(token).cloned()
    }

    pub fn get_pending_confirmations_for_device(&self, device_id: &str) -> Vec<PendingConfirmation> {
        self.lock().registry.pending_for_device(device_id)
    }

    /// Run one sweep now; returns how many confirmations were removed
    pub fn sweep_expired(&self) -> usize {
        self.shared.sweep_expired()
    }

    // =========================================================================
    // Sweeper lifecycle
    // =========================================================================

    /// Start the background sweep. A running sweeper is replaced.
    pub fn start_sweeper(&self, every: Duration) -> HubResult<()> {
        let sweeper = Sweeper::spawn(Arc::downgrade(&self.shared), every)?;
        if let Some(previous) = self.sweeper().replace(sweeper) {
            previous.stop();
        }
        Ok(())
    }

    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = self.sweeper().take() {
            sweeper.stop();
        }
    }

    pub fn is_sweeper_running(&self) -> bool {
        self.sweeper().as_ref().is_some_and(Sweeper::is_running)
    }

    /// Stop background work. Pending confirmations and the audit log stay
    /// readable.
    pub fn shutdown(&self) {
        self.stop_sweeper();
    }

    // =========================================================================
    // Audit
    // =========================================================================

    pub fn get_audit_log(&self, limit: Option<usize>) -> Vec<AuditEntry> {
        self.lock().audit.get(limit)
    }

    pub fn get_audit_stats(&self) -> AuditStats {
        let state = self.lock();
        state.audit.stats(state.registry.len())
    }

    pub fn clear_audit_log(&self) {
        self.lock().audit.clear();
    }

    /// Audit log as JSON Lines
    pub fn export_audit_log(&self) -> String {
        self.lock().audit.to_jsonl()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Merge a partial update into the live config. On validation failure
    /// the previous config stays in force.
    pub fn update_config(&self, update: PolicyConfigUpdate) -> HubResult<()> {
        let mut state = self.lock();
        let mut next = state.config.clone();
        next.merge(update);

        if let Err(e) = next.validate() {
            warn!(error = %e, "Rejected policy config update");
            return Err(e);
        }

        state.audit.set_enabled(next.global_settings.enable_audit_log);
        state.audit.set_max_entries(next.global_settings.audit_log_max_entries);
        state.config = next;

        info!(
            device_policies = state.config.device_policies.len(),
            scene_policies = state.config.scene_policies.len(),
            "Policy config updated"
        );
        Ok(())
    }

    /// Snapshot of the current config
    pub fn get_config(&self) -> PolicyConfig {
        self.lock().config.clone()
    }
}

impl Drop for PolicyEngine {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            sweeper.stop();
        }
    }
}

/// Mint a token if needed, audit, and build the result
fn finish(
    state: &mut EngineState,
    command: Command,
    tool_name: &str,
    risk_level: RiskLevel,
    outcome: Outcome,
    now: DateTime<Utc>,
) -> PolicyResult {
    let Outcome { decision, reason } = outcome;

    let verdict = match decision {
        PolicyDecision::Allow => Verdict::Allow,
        PolicyDecision::Deny => Verdict::Deny,
        PolicyDecision::RequireConfirmation => {
            let timeout = state.confirmation_timeout();
            let confirmation_token =
                state.registry.create(command.clone(), risk_level, reason.clone(), now, timeout);
            Verdict::RequireConfirmation { confirmation_token }
        }
    };

    let device_id = command.device_id().map(str::to_string);
    let scene_id = command.scene_id().map(str::to_string);
    let entry = AuditEntry::new(tool_name, command, decision, risk_level, now).with_reason(reason.clone());
    state.audit.log(entry);

    match decision {
        PolicyDecision::Allow => debug!(?device_id, ?scene_id, risk = %risk_level, "Command allowed"),
        _ => info!(
            ?device_id,
            ?scene_id,
            risk = %risk_level,
            decision = %decision,
            reason = %reason,
            "Command not allowed outright"
        ),
    }

    PolicyResult::new(verdict, risk_level, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalSettingsUpdate;
    use crate::rule::DevicePolicy;
    use chrono::TimeZone;
    use homegate_core::{Capability, ManualClock};

    fn engine(update: PolicyConfigUpdate) -> (PolicyEngine, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap());
        let engine = PolicyEngine::with_clock(update, Arc::new(clock.clone())).unwrap();
        (engine, clock)
    }

    fn permissive() -> PolicyConfigUpdate {
        PolicyConfigUpdate::new().global_settings(GlobalSettingsUpdate {
            allow_high_risk_actions: Some(true),
            ..Default::default()
        })
    }

    fn unlock() -> DeviceCommand {
        DeviceCommand::new("front_door", Capability::Lock, "unlock")
    }

    #[test]
    fn test_tool_name_defaults() {
        let (engine, _) = engine(PolicyConfigUpdate::new());
        let lamp = DeviceCommand::new("lamp", Capability::Switch, "turn_on");
        engine.evaluate_device_command(&lamp, None, None);
        engine.evaluate_device_command(&lamp, None, Some("set_light"));
        engine.evaluate_scene_command(&SceneCommand::new("away"), None);

        let log = engine.get_audit_log(None);
        assert_eq!(log[0].tool_name, DEVICE_TOOL);
        assert_eq!(log[1].tool_name, "set_light");
        assert_eq!(log[2].tool_name, SCENE_TOOL);
        assert_eq!(log[2].scene_id.as_deref(), Some("away"));
    }

    #[test]
    fn test_confirm_writes_audit_entry() {
        let (engine, _) = engine(permissive());
        let result = engine.evaluate_device_command(&unlock(), None, None);
        let token = result.confirmation_token().unwrap().clone();

        let record = engine.confirm_action(token.as_str(), Some("alice")).unwrap();
        assert_eq!(record.device_id.as_deref(), Some("front_door"));

        let last = engine.get_audit_log(Some(1)).remove(0);
        assert_eq!(last.tool_name, CONFIRM_TOOL);
        assert_eq!(last.decision, PolicyDecision::Allow);
        assert_eq!(last.confirmed_by.as_deref(), Some("alice"));
        assert_eq!(
            last.reason.as_deref(),
            Some("Confirmed: High-risk action requires confirmation")
        );
    }

    #[test]
    fn test_expired_confirm_is_silent() {
        let (engine, clock) = engine(permissive());
        let result = engine.evaluate_device_command(&unlock(), None, None);
        let token = result.confirmation_token().unwrap().clone();
        let before = engine.get_audit_log(None).len();

        clock.advance(chrono::Duration::seconds(301));
        assert!(engine.confirm_action(token.as_str(), None).is_none());
        assert_eq!(engine.get_audit_log(None).len(), before);
        assert!(engine.get_pending_confirmation(token.as_str()).is_none());
    }

    #[test]
    fn test_deny_action() {
        let (engine, _) = engine(permissive());
        let result = engine.evaluate_device_command(&unlock(), None, None);
        let token = result.confirmation_token().unwrap().clone();

        assert!(engine.deny_action(token.as_str()));
        assert!(!engine.deny_action(token.as_str()));
        assert!(engine.confirm_action(token.as_str(), None).is_none());

        let last = engine.get_audit_log(Some(1)).remove(0);
        assert_eq!(last.decision, PolicyDecision::Deny);
        assert!(!last.success);
        assert_eq!(
            last.reason.as_deref(),
            Some("Denied: High-risk action requires confirmation")
        );
    }

    #[test]
    fn test_scene_confirmation_mints_token() {
        let (engine, _) = engine(PolicyConfigUpdate::new().scene_policies(vec![
            crate::rule::ScenePolicy::new().for_scene("away").requiring_confirmation(),
        ]));
        let result = engine.evaluate_scene_command(&SceneCommand::new("away"), None);
        let token = result.confirmation_token().unwrap();

        let pending = engine.get_pending_confirmation(token.as_str()).unwrap();
        assert_eq!(pending.kind, homegate_core::CommandKind::Scene);
        assert_eq!(pending.scene_id.as_deref(), Some("away"));
        assert_eq!(pending.risk_level, RiskLevel::Safe);
    }

    #[test]
    fn test_update_config_rejects_and_keeps_old() {
        let (engine, _) = engine(PolicyConfigUpdate::new());
        let bad = PolicyConfigUpdate::new().global_settings(GlobalSettingsUpdate {
            confirmation_timeout_secs: Some(0),
            ..Default::default()
        });
        assert!(engine.update_config(bad).is_err());
        assert_eq!(engine.get_config().global_settings.confirmation_timeout_secs, 300);
    }

    #[test]
    fn test_update_config_replaces_rules() {
        let (engine, _) = engine(PolicyConfigUpdate::new());
        engine
            .update_config(PolicyConfigUpdate::new().device_policies(vec![
                DevicePolicy::new().for_device("lamp").with_decision(PolicyDecision::Deny),
            ]))
            .unwrap();

        let lamp = DeviceCommand::new("lamp", Capability::Switch, "turn_on");
        assert!(engine.evaluate_device_command(&lamp, None, None).is_denied());

        engine
            .update_config(PolicyConfigUpdate::new().device_policies(vec![]))
            .unwrap();
        assert!(engine.evaluate_device_command(&lamp, None, None).is_allowed());
    }

    #[test]
    fn test_disabling_audit() {
        let (engine, _) = engine(PolicyConfigUpdate::new());
        let lamp = DeviceCommand::new("lamp", Capability::Switch, "turn_on");
        engine.evaluate_device_command(&lamp, None, None);

        engine
            .update_config(PolicyConfigUpdate::new().global_settings(GlobalSettingsUpdate {
                enable_audit_log: Some(false),
                ..Default::default()
            }))
            .unwrap();
        engine.evaluate_device_command(&lamp, None, None);
        assert_eq!(engine.get_audit_log(None).len(), 1);

        engine.clear_audit_log();
        assert_eq!(engine.get_audit_stats().total, 0);
    }

    #[test]
    fn test_timeout_change_applies_to_new_tokens() {
        let (engine, clock) = engine(permissive());
        engine
            .update_config(PolicyConfigUpdate::new().global_settings(GlobalSettingsUpdate {
                confirmation_timeout_secs: Some(10),
                ..Default::default()
            }))
            .unwrap();

        let result = engine.evaluate_device_command(&unlock(), None, None);
        let pending = engine
            .get_pending_confirmation(result.confirmation_token().unwrap().as_str())
            .unwrap();
        assert_eq!(pending.expires_at, clock.now() + chrono::Duration::seconds(10));
    }

    #[test]
    fn test_sweeper_requires_runtime() {
        let (engine, _) = engine(PolicyConfigUpdate::new());
        let err = engine.start_sweeper(Duration::from_secs(60)).unwrap_err();
        assert!(err.to_string().starts_with("RUNTIME/"));
        assert!(!engine.is_sweeper_running());
    }
}
