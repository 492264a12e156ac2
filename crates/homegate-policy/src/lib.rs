//! Homegate Policy: Authorization, Confirmation, and Audit
//!
//! Every device command and scene activation passes through the
//! [`PolicyEngine`] before it reaches an adapter. The engine answers ALLOW,
//! DENY, or REQUIRE_CONFIRMATION, keeps the pending confirmations, and
//! records each decision in a bounded audit log.
//!
//! # Architecture
//!
//! ```text
//! Command → Risk Classification → Decision Chain → Verdict
//!                  ↓                     ↓             ↓
//!              RiskLevel      quiet hours / rule /  ALLOW/DENY/
//!                             bounds / high risk    REQUIRE_CONFIRMATION
//!                  ↓                     ↓             ↓
//!                  └─────────────────────┴─────────────┘
//!                                  ↓
//!                   Audit Log  +  Pending Confirmations ← Sweeper
//! ```
//!
//! # Example
//!
//! ```
//! use homegate_core::{Capability, DeviceCommand};
//! use homegate_policy::{PolicyConfigUpdate, PolicyDecision, PolicyEngine};
//!
//! let engine = PolicyEngine::new(PolicyConfigUpdate::new())?;
//!
//! let unlock = DeviceCommand::new("front_door", Capability::Lock, "unlock");
//! let result = engine.evaluate_device_command(&unlock, None, None);
//! assert_eq!(result.decision(), PolicyDecision::Deny);
//!
//! let lamp = DeviceCommand::new("living_room", Capability::Switch, "turn_on");
//! assert!(engine.evaluate_device_command(&lamp, None, None).is_allowed());
//!
//! assert_eq!(engine.get_audit_stats().total, 2);
//! # Ok::<(), homegate_core::HubError>(())
//! ```
//!
//! # Confirmation
//!
//! ```
//! use homegate_core::{Capability, DeviceCommand};
//! use homegate_policy::{GlobalSettingsUpdate, PolicyConfigUpdate, PolicyEngine};
//!
//! let engine = PolicyEngine::new(PolicyConfigUpdate::new().global_settings(
//!     GlobalSettingsUpdate {
//!         allow_high_risk_actions: Some(true),
//!         ..Default::default()
//!     },
//! ))?;
//!
//! let unlock = DeviceCommand::new("front_door", Capability::Lock, "unlock");
//! let result = engine.evaluate_device_command(&unlock, None, None);
//! let token = result.confirmation_token().unwrap().clone();
//!
//! assert!(engine.confirm_action(token.as_str(), Some("alice")).is_some());
//! // single use
//! assert!(engine.confirm_action(token.as_str(), Some("alice")).is_none());
//! # Ok::<(), homegate_core::HubError>(())
//! ```

pub mod audit;
pub mod bounds;
pub mod config;
pub mod confirmation;
pub mod engine;
pub mod evaluation;
pub mod quiet_hours;
pub mod risk;
pub mod rule;
mod sweeper;
pub mod verdict;

// Engine
pub use engine::PolicyEngine;
pub use sweeper::DEFAULT_SWEEP_INTERVAL;

// Decisions
pub use verdict::{PolicyDecision, PolicyResult, Verdict};
pub use risk::{classify_device_risk, classify_scene_risk, RiskLevel};

// Configuration
pub use config::{GlobalSettings, GlobalSettingsUpdate, PolicyConfig, PolicyConfigUpdate};
pub use rule::{DevicePolicy, ScenePolicy};
pub use bounds::{Bounds, RangeViolation, ValueRange};
pub use quiet_hours::TimeRange;

// Confirmation and audit
pub use confirmation::{ConfirmationToken, PendingConfirmation};
pub use audit::{AuditEntry, AuditLog, AuditStats};
