use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use super::{Journal, JournalEntry};
use crate::{ActionId, IgnisError, NetworkId, Result, fs::FsHandler};

/// Name of the journal file inside a deployment directory.
pub const JOURNAL_FILENAME: &str = "journal.json";
/// Name of the address summary written after a successful deployment.
pub const DEPLOYED_ADDRESSES_FILENAME: &str = "deployed_addresses.json";
const LOCK_FILENAME: &str = "journal.lock";

/// On-disk layout of the journal.
#[derive(Debug, Serialize, Deserialize)]
struct JournalFile {
    deployment_id: String,
    network: NetworkId,
    entries: Vec<JournalEntry>,
}

/// Journal persisted as JSON at
/// `<state_dir>/deployments/<deployment-id>/<network>/journal.json`.
///
/// Every `put` rewrites the file atomically before returning. An exclusive
/// lock on the directory is held while the journal is open, so two
/// orchestrators cannot write the same (deployment, network) journal.
#[derive(Debug)]
pub struct FileJournal {
    dir: PathBuf,
    deployment_id: String,
    network: NetworkId,
    entries: BTreeMap<ActionId, JournalEntry>,
    _lock: File,
}

impl FileJournal {
    /// Directory holding the journal of `deployment_id` on `network`.
    pub fn directory(state_dir: &Path, deployment_id: &str, network: &NetworkId) -> PathBuf {
        state_dir
            .join("deployments")
            .join(FsHandler::path_component(deployment_id))
            .join(FsHandler::path_component(network.as_str()))
    }

    /// Open (or create) the journal of `deployment_id` on `network`.
    pub fn open(state_dir: &Path, deployment_id: &str, network: &NetworkId) -> Result<Self> {
        let dir = Self::directory(state_dir, deployment_id, network);
        std::fs::create_dir_all(&dir).map_err(|e| {
            IgnisError::Journal(format!("failed to create {}: {e}", dir.display()))
        })?;

        let lock = FsHandler::lock_exclusive(&dir.join(LOCK_FILENAME))
            .map_err(|e| IgnisError::Journal(format!("{e:#}")))?;

        let path = dir.join(JOURNAL_FILENAME);
        let entries = if path.exists() {
            let file = Self::read(&path)?;
            if file.deployment_id != deployment_id || &file.network != network {
                return Err(IgnisError::Journal(format!(
                    "{} belongs to deployment `{}` on network `{}`, not `{}` on `{}`",
                    path.display(),
                    file.deployment_id,
                    file.network,
                    deployment_id,
                    network
                )));
            }
            file.entries
                .into_iter()
                .map(|entry| (entry.action.clone(), entry))
                .collect()
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "Journal opened"
        );

        Ok(Self {
            dir,
            deployment_id: deployment_id.to_string(),
            network: network.clone(),
            entries,
            _lock: lock,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(JOURNAL_FILENAME)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    /// Addresses of every deployed action, keyed by action id.
    pub fn deployed_addresses(&self) -> BTreeMap<String, Address> {
        self.entries
            .values()
            .filter_map(|entry| {
                entry
                    .deployed_address()
                    .map(|address| (entry.action.to_string(), address))
            })
            .collect()
    }

    /// Write `deployed_addresses.json` next to the journal.
    pub fn write_deployed_addresses(&self) -> Result<PathBuf> {
        let path = self.dir.join(DEPLOYED_ADDRESSES_FILENAME);
        let json = serde_json::to_vec_pretty(&self.deployed_addresses())
            .map_err(|e| IgnisError::Journal(format!("failed to serialize addresses: {e}")))?;
        FsHandler::atomic_write(&path, &json).map_err(|e| IgnisError::Journal(format!("{e:#}")))?;
        Ok(path)
    }

    fn read(path: &Path) -> Result<JournalFile> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| IgnisError::Journal(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| IgnisError::Journal(format!("failed to parse {}: {e}", path.display())))
    }

    /// Write `entries` to disk. The in-memory state is only replaced once this succeeds.
    fn persist(&self, entries: &BTreeMap<ActionId, JournalEntry>) -> Result<()> {
        let file = JournalFile {
            deployment_id: self.deployment_id.clone(),
            network: self.network.clone(),
            entries: entries.values().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| IgnisError::Journal(format!("failed to serialize journal: {e}")))?;
        FsHandler::atomic_write(&self.path(), &json)
            .map_err(|e| IgnisError::Journal(format!("{e:#}")))
    }
}

impl Journal for FileJournal {
    fn get(&self, action: &ActionId) -> Option<JournalEntry> {
        self.entries.get(action).cloned()
    }

    fn put(&mut self, entry: JournalEntry) -> Result<()> {
        let mut entries = self.entries.clone();
        entries.insert(entry.action.clone(), entry);
        self.persist(&entries)?;
        self.entries = entries;
        Ok(())
    }

    fn all(&self) -> Vec<JournalEntry> {
        self.entries.values().cloned().collect()
    }

    fn clear(&mut self) -> Result<()> {
        self.persist(&BTreeMap::new())?;
        self.entries.clear();

        let addresses = self.dir.join(DEPLOYED_ADDRESSES_FILENAME);
        if addresses.exists() {
            std::fs::remove_file(&addresses).map_err(|e| {
                IgnisError::Journal(format!("failed to remove {}: {e}", addresses.display()))
            })?;
        }

        tracing::info!(path = %self.path().display(), "Journal reset");
        Ok(())
    }
}
