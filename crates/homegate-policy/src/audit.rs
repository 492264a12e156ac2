//! Audit trail of policy decisions
//!
//! Every evaluation and every confirm/deny produces one entry. The log is a
//! bounded FIFO: past `max_entries`, the oldest entries are dropped.

use crate::risk::RiskLevel;
use crate::verdict::PolicyDecision;
use chrono::{DateTime, Utc};
use homegate_core::Command;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Upper bound on the up-front allocation for the ring buffer
const MAX_PREALLOCATED: usize = 1024;

/// An audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID
    pub id: String,

    pub timestamp: DateTime<Utc>,

    /// Tool that asked for the decision
    pub tool_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,

    pub command: Command,

    pub decision: PolicyDecision,

    pub risk_level: RiskLevel,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// False only for DENY
    pub success: bool,

    /// Who approved a confirmation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,
}

impl AuditEntry {
    pub fn new(
        tool_name: impl Into<String>,
        command: Command,
        decision: PolicyDecision,
        risk_level: RiskLevel,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_audit_id(timestamp),
            timestamp,
            tool_name: tool_name.into(),
            device_id: command.device_id().map(str::to_string),
            scene_id: command.scene_id().map(str::to_string),
            command,
            decision,
            risk_level,
            reason: None,
            success: decision.is_success(),
            confirmed_by: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_confirmed_by(mut self, who: Option<String>) -> Self {
        self.confirmed_by = who;
        self
    }
}

/// Bounded in-memory audit log
#[derive(Debug)]
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    max_entries: usize,
    enabled: bool,
}

impl AuditLog {
    /// Create an enabled log holding at most `max_entries`
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries.min(MAX_PREALLOCATED)),
            max_entries,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stop or resume recording. Existing entries are kept.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Change the bound, dropping the oldest entries if needed
    pub fn set_max_entries(&mut self, max_entries: usize) {
        self.max_entries = max_entries.max(1);
        self.trim();
    }

    /// Append an entry. Returns false when auditing is disabled.
    pub fn log(&mut self, entry: AuditEntry) -> bool {
        if !self.enabled {
            return false;
        }
        self.entries.push_back(entry);
        self.trim();
        true
    }

    fn trim(&mut self) {
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// The last `limit` entries (oldest first), or all of them
    pub fn get(&self, limit: Option<usize>) -> Vec<AuditEntry> {
        let skip = limit.map_or(0, |n| self.entries.len().saturating_sub(n));
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    pub fn entries_since(&self, timestamp: DateTime<Utc>) -> Vec<&AuditEntry> {
        self.entries.iter()
            .filter(|e| e.timestamp >= timestamp)
            .collect()
    }

    pub fn entries_for_device(&self, device_id: &str) -> Vec<&AuditEntry> {
        self.entries.iter()
            .filter(|e| e.device_id.as_deref() == Some(device_id))
            .collect()
    }

    pub fn entries_for_scene(&self, scene_id: &str) -> Vec<&AuditEntry> {
        self.entries.iter()
            .filter(|e| e.scene_id.as_deref() == Some(scene_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Export to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Export to JSON Lines
    pub fn to_jsonl(&self) -> String {
        self.entries.iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Counts by decision; `pending_confirmations` comes from the registry
    pub fn stats(&self, pending_confirmations: usize) -> AuditStats {
        let count = |decision: PolicyDecision| {
            self.entries.iter().filter(|e| e.decision == decision).count()
        };

        AuditStats {
            total: self.entries.len(),
            allowed: count(PolicyDecision::Allow),
            denied: count(PolicyDecision::Deny),
            confirmed: count(PolicyDecision::RequireConfirmation),
            pending_confirmations,
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_AUDIT_LOG_MAX_ENTRIES)
    }
}

/// Statistics about audit entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: usize,
    pub allowed: usize,
    pub denied: usize,
    /// Entries whose decision was REQUIRE_CONFIRMATION
    pub confirmed: usize,
    /// Confirmations currently awaiting a response
    pub pending_confirmations: usize,
}

fn generate_audit_id(timestamp: DateTime<Utc>) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("aud_{:x}_{:04x}", timestamp.timestamp_millis(), counter)
}
