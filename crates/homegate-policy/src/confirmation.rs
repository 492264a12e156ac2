//! Pending confirmations
//!
//! A confirmation is minted when a command resolves to REQUIRE_CONFIRMATION
//! and leaves the registry exactly once: confirmed, denied, or expired.
//! Tokens are random v4 UUIDs and are never handed out twice.

use crate::risk::RiskLevel;
use chrono::{DateTime, Duration, Utc};
use homegate_core::{Command, CommandKind};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque single-use confirmation token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationToken(String);

impl ConfirmationToken {
    pub fn generate() -> Self {
        Self(format!("confirm_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConfirmationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConfirmationToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ConfirmationToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ConfirmationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmationToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A command waiting for explicit approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub token: ConfirmationToken,
    pub command: Command,
    pub kind: CommandKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    pub risk_level: RiskLevel,
    /// Why confirmation was required
    pub reason: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirmation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// Outcome of taking a token out of the registry
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Token was live; the record has been removed
    Resolved(PendingConfirmation),
    /// Token had expired; the record has been removed
    Expired(PendingConfirmation),
    /// Unknown, already resolved, or swept
    NotFound,
}

/// Pending confirmations keyed by token
#[derive(Debug, Default)]
pub struct ConfirmationRegistry {
    pending: HashMap<ConfirmationToken, PendingConfirmation>,
}

impl ConfirmationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending confirmation and return its token
    pub fn create(
        &mut self,
        command: Command,
        risk_level: RiskLevel,
        reason: impl Into<String>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> ConfirmationToken {
        let mut token = ConfirmationToken::generate();
        while self.pending.contains_key(&token) {
            token = ConfirmationToken::generate();
        }

        let record = PendingConfirmation {
            token: token.clone(),
            kind: command.kind(),
            device_id: command.device_id().map(str::to_string),
            scene_id: command.scene_id().map(str::to_string),
            command,
            risk_level,
            reason: reason.into(),
            created_at: now,
            expires_at: now + timeout,
        };
        self.pending.insert(token.clone(), record);
        token
    }

    pub fn get(&self, token: &str) -> Option<&PendingConfirmation> {
        self.pending.get(token)
    }

    /// All pending confirmations, oldest first
    pub fn list(&self) -> Vec<PendingConfirmation> {
        let mut all: Vec<PendingConfirmation> = self.pending.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.token.cmp(&b.token)));
        all
    }

    pub fn pending_for_device(&self, device_id: &str) -> Vec<PendingConfirmation> {
        self.list()
            .into_iter()
            .filter(|p| p.device_id.as_deref() == Some(device_id))
            .collect()
    }

    /// Remove a token, reporting whether it was still live at `now`
    pub fn take(&mut self, token: &str, now: DateTime<Utc>) -> Resolution {
        match self.pending.remove(token) {
            None => Resolution::NotFound,
            Some(record) if record.is_expired(now) => Resolution::Expired(record),
            Some(record) => Resolution::Resolved(record),
        }
    }

    /// Remove a token regardless of expiry
    pub fn remove(&mut self, token: &str) -> Option<PendingConfirmation> {
        self.pending.remove(token)
    }

    /// Drop every expired record, returning what was removed
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<PendingConfirmation> {
        let expired: Vec<ConfirmationToken> = self
            .pending
            .values()
            .filter(|p| p.is_expired(now))
            .map(|p| p.token.clone())
            .collect();

        expired
            .iter()
            .filter_map(|token| self.pending.remove(token))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
