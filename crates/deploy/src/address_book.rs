//! Per-network book of pre-known contract addresses.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use anyhow::Context;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a target network (e.g. `sepolia`, `localhost`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NetworkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NetworkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Symbolic names mapped to addresses, grouped by network.
///
/// Stored as TOML with one table per network:
///
/// ```toml
/// [sepolia]
/// Oracle = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBook {
    networks: BTreeMap<NetworkId, BTreeMap<String, Address>>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an entry.
    pub fn with_address(
        mut self,
        network: impl Into<NetworkId>,
        name: impl Into<String>,
        address: Address,
    ) -> Self {
        self.networks
            .entry(network.into())
            .or_default()
            .insert(name.into(), address);
        self
    }

    /// Look up `name` for `network`. There is no fallback to other networks.
    pub fn resolve(&self, network: &NetworkId, name: &str) -> Option<Address> {
        self.networks
            .get(network)
            .and_then(|addresses| addresses.get(name))
            .copied()
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkId> {
        self.networks.keys()
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("Failed to parse address book as TOML")
    }

    /// Load the address book from a TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read address book from {}", path.display()))?;
        let book = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), networks = book.networks.len(), "Address book loaded");
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORACLE: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn test_resolve_is_network_scoped() {
        let address: Address = ORACLE.parse().unwrap();
        let book = AddressBook::new().with_address("sepolia", "Oracle", address);

        assert_eq!(book.resolve(&"sepolia".into(), "Oracle"), Some(address));
        assert_eq!(
            book.resolve(&"localhost".into(), "Oracle"),
            None,
            "An address registered for one network must not leak to another"
        );
        assert_eq!(book.resolve(&"sepolia".into(), "Missing"), None);
    }

    #[test]
    fn test_parse_toml() {
        let book = AddressBook::from_toml_str(&format!(
            "[sepolia]\nOracle = \"{ORACLE}\"\n\n[mainnet]\nOracle = \"0x0000000000000000000000000000000000000001\"\n"
        ))
        .unwrap();

        assert_eq!(book.networks().count(), 2);
        assert_eq!(
            book.resolve(&"sepolia".into(), "Oracle"),
            Some(ORACLE.parse().unwrap())
        );
    }

    #[test]
    fn test_parse_toml_rejects_bad_address() {
        let result = AddressBook::from_toml_str("[sepolia]\nOracle = \"not-an-address\"\n");
        assert!(result.is_err(), "Malformed addresses should fail to load");
    }
}
