//! Durable record of deployment outcomes.
//!
//! The journal is what makes reruns idempotent: a `Deployed` entry is never
//! submitted again, while `Pending` and `Failed` entries are retried.

mod file;
mod memory;

pub use file::{DEPLOYED_ADDRESSES_FILENAME, FileJournal, JOURNAL_FILENAME};
pub use memory::InMemoryJournal;

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{ActionId, Result};

/// Outcome of the latest attempt at an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Deployed,
    Failed,
}

/// A single journal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub action: ActionId,
    pub status: ActionStatus,
    /// Artifact that was (or is being) deployed.
    pub artifact: String,
    /// Fingerprint of the action definition at the time of the attempt.
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix timestamp (seconds) of the last status change.
    pub updated_at: u64,
}

impl JournalEntry {
    /// A fresh `Pending` entry.
    pub fn pending(
        action: ActionId,
        artifact: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            action,
            status: ActionStatus::Pending,
            artifact: artifact.into(),
            fingerprint: fingerprint.into(),
            address: None,
            error: None,
            updated_at: now(),
        }
    }

    /// Transition to `Deployed` at `address`.
    pub fn deployed(self, address: Address) -> Self {
        Self {
            status: ActionStatus::Deployed,
            address: Some(address),
            error: None,
            updated_at: now(),
            ..self
        }
    }

    /// Transition to `Failed` with the backend's error.
    pub fn failed(self, error: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            address: None,
            error: Some(error.into()),
            updated_at: now(),
            ..self
        }
    }

    /// The deployed address, if this entry is `Deployed`.
    pub fn deployed_address(&self) -> Option<Address> {
        match self.status {
            ActionStatus::Deployed => self.address,
            _ => None,
        }
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Storage for journal entries of one (deployment, network) pair.
///
/// The executor is the only writer; the planner only reads.
pub trait Journal {
    fn get(&self, action: &ActionId) -> Option<JournalEntry>;

    /// Insert or replace the entry for `entry.action`. Must be durable before returning.
    fn put(&mut self, entry: JournalEntry) -> Result<()>;

    /// Every entry, ordered by action id.
    fn all(&self) -> Vec<JournalEntry>;

    /// Forget every entry.
    fn clear(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_transitions() {
        let id = ActionId::new("OracleModule", "Oracle");
        let pending = JournalEntry::pending(id.clone(), "Oracle", "abc");
        assert_eq!(pending.status, ActionStatus::Pending);
        assert_eq!(pending.deployed_address(), None);

        let failed = pending.clone().failed("execution reverted");
        assert_eq!(failed.status, ActionStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("execution reverted"));
        assert_eq!(failed.deployed_address(), None);

        let address = Address::with_last_byte(1);
        let deployed = failed.deployed(address);
        assert_eq!(deployed.status, ActionStatus::Deployed);
        assert_eq!(deployed.deployed_address(), Some(address));
        assert_eq!(deployed.error, None, "A deployed entry carries no error");
        assert_eq!(deployed.action, id);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ActionStatus::Deployed.to_string(), "deployed");
        assert_eq!(ActionStatus::Failed.to_string(), "failed");
    }
}
