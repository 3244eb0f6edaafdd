//! Content hashes used to detect definition changes between runs.

use std::collections::BTreeMap;

use alloy_core::primitives::{Address, U256};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{ActionId, AddressBook, ArgumentSpec, DeployAction, NetworkId};

/// The parts of a [`DeployAction`] that, when changed, make a previous deployment stale.
///
/// The action id itself is excluded: it is the journal key.
#[derive(Debug, Serialize)]
struct ActionFingerprint<'a> {
    artifact: &'a str,
    args: &'a [ArgumentSpec],
    value: Option<U256>,
    after: &'a [ActionId],
    /// What the network-address arguments resolve to on the target network.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    network_addresses: BTreeMap<&'a str, Option<Address>>,
}

/// Compute the SHA-256 fingerprint of an action definition on `network`.
///
/// The fingerprint is deterministic: the same definition always hashes to the
/// same hex string. Network addresses are hashed by name and by the address
/// `address_book` gives them on `network`, so editing a book entry makes the
/// contracts built with it stale. The fingerprint is recorded in every journal
/// entry so that a rerun can tell whether a deployed action still matches.
pub fn action_fingerprint(
    action: &DeployAction,
    address_book: &AddressBook,
    network: &NetworkId,
) -> String {
    let network_addresses = action
        .args
        .iter()
        .filter_map(|arg| match arg {
            ArgumentSpec::NetworkAddress(name) => {
                Some((name.as_str(), address_book.resolve(network, name)))
            }
            _ => None,
        })
        .collect();

    let fingerprint = ActionFingerprint {
        artifact: &action.artifact,
        args: &action.args,
        value: action.value,
        after: &action.after,
        network_addresses,
    };

    let json = serde_json::to_vec(&fingerprint)
        .expect("ActionFingerprint serialization should never fail");

    let mut hasher = Sha256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action() -> DeployAction {
        DeployAction {
            id: ActionId::new("UseCaseExampleModule", "UseCaseExample"),
            artifact: "UseCaseExample".to_string(),
            args: vec![
                ArgumentSpec::Reference(ActionId::new("OracleModule", "Oracle")),
                ArgumentSpec::literal(json!(42)),
            ],
            value: None,
            after: vec![],
        }
    }

    fn fingerprint(action: &DeployAction) -> String {
        action_fingerprint(action, &AddressBook::new(), &NetworkId::new("localhost"))
    }

    #[test]
    fn test_fingerprint_determinism() {
        let hash1 = fingerprint(&action());
        let hash2 = fingerprint(&action());

        assert_eq!(hash1, hash2, "Fingerprint should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_fingerprint_changes_with_args() {
        let mut changed = action();
        changed.args[1] = ArgumentSpec::literal(json!(43));

        assert_ne!(
            fingerprint(&action()),
            fingerprint(&changed),
            "Fingerprint should change when a literal argument changes"
        );
    }

    #[test]
    fn test_fingerprint_changes_with_artifact() {
        let mut changed = action();
        changed.artifact = "UseCaseExampleV2".to_string();

        assert_ne!(
            fingerprint(&action()),
            fingerprint(&changed),
            "Fingerprint should change when the artifact changes"
        );
    }

    #[test]
    fn test_fingerprint_changes_with_value() {
        let mut changed = action();
        changed.value = Some(U256::from(1_000u64));

        assert_ne!(
            fingerprint(&action()),
            fingerprint(&changed),
            "Fingerprint should change when the attached value changes"
        );
    }

    #[test]
    fn test_fingerprint_ignores_action_id() {
        let mut renamed = action();
        renamed.id = ActionId::new("OtherModule", "UseCaseExample");

        assert_eq!(
            fingerprint(&action()),
            fingerprint(&renamed),
            "The action id is the journal key and is not part of the fingerprint"
        );
    }

    #[test]
    fn test_fingerprint_follows_address_book_entries() {
        let mut with_treasury = action();
        with_treasury.args.push(ArgumentSpec::network_address("Treasury"));

        let localhost = NetworkId::new("localhost");
        let before = AddressBook::new().with_address("localhost", "Treasury", Address::with_last_byte(1));
        let moved = AddressBook::new().with_address("localhost", "Treasury", Address::with_last_byte(2));
        let elsewhere = before
            .clone()
            .with_address("sepolia", "Treasury", Address::with_last_byte(3));

        let original = action_fingerprint(&with_treasury, &before, &localhost);
        assert_ne!(
            original,
            action_fingerprint(&with_treasury, &moved, &localhost),
            "Fingerprint should change when a network address points elsewhere"
        );
        assert_eq!(
            original,
            action_fingerprint(&with_treasury, &elsewhere, &localhost),
            "Entries of other networks are not part of the fingerprint"
        );
    }

    #[test]
    fn test_fingerprint_without_network_addresses_ignores_the_book() {
        let book = AddressBook::new().with_address("localhost", "Treasury", Address::with_last_byte(1));

        assert_eq!(
            fingerprint(&action()),
            action_fingerprint(&action(), &book, &NetworkId::new("localhost"))
        );
    }
}
