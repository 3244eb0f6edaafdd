//! Sequential execution of a plan against a deployment backend.

use std::collections::HashMap;

use crate::{
    AddressBook, Artifact, ArtifactProvider, ArgumentSpec, DeployAction, DeployArg,
    DeploymentBackend, ExecutionPlan, IgnisError, Journal, JournalEntry, NetworkId, Result,
    deployment_hash::action_fingerprint,
};

/// Check everything that can be checked without touching the network.
///
/// Loads the artifact of every planned action, resolves every network address
/// and compares argument counts with the artifact constructor. Returns the
/// loaded artifacts keyed by name.
pub fn preflight(
    plan: &ExecutionPlan,
    artifacts: &impl ArtifactProvider,
    address_book: &AddressBook,
    network: &NetworkId,
) -> Result<HashMap<String, Artifact>> {
    let mut loaded: HashMap<String, Artifact> = HashMap::new();

    for step in &plan.steps {
        let action = &step.action;

        if !loaded.contains_key(&action.artifact) {
            let artifact = artifacts.artifact(&action.artifact)?;
            loaded.insert(action.artifact.clone(), artifact);
        }
        let artifact = &loaded[&action.artifact];

        let expected = artifact.constructor_arity();
        if expected != action.args.len() {
            return Err(IgnisError::ArgumentCount {
                action: action.id.clone(),
                artifact: artifact.name.clone(),
                expected,
                given: action.args.len(),
            });
        }

        for arg in &action.args {
            if let ArgumentSpec::NetworkAddress(name) = arg {
                resolve_network_address(address_book, network, name)?;
            }
        }
    }

    Ok(loaded)
}

fn resolve_network_address(
    address_book: &AddressBook,
    network: &NetworkId,
    name: &str,
) -> Result<alloy_core::primitives::Address> {
    address_book
        .resolve(network, name)
        .ok_or_else(|| IgnisError::UnknownNetworkAddress {
            network: network.clone(),
            name: name.to_string(),
        })
}

/// Runs planned actions one at a time, recording every outcome in the journal.
pub struct Executor<'a, B, J> {
    backend: &'a B,
    journal: &'a mut J,
    address_book: &'a AddressBook,
    network: &'a NetworkId,
}

impl<'a, B, J> Executor<'a, B, J>
where
    B: DeploymentBackend,
    J: Journal,
{
    pub fn new(
        backend: &'a B,
        journal: &'a mut J,
        address_book: &'a AddressBook,
        network: &'a NetworkId,
    ) -> Self {
        Self {
            backend,
            journal,
            address_book,
            network,
        }
    }

    /// Execute `plan` in order, stopping at the first failure.
    ///
    /// `artifacts` must contain every artifact the plan needs (see [`preflight`]).
    pub async fn execute(
        &mut self,
        plan: &ExecutionPlan,
        artifacts: &HashMap<String, Artifact>,
    ) -> Result<()> {
        let total = plan.len();

        for (position, step) in plan.steps.iter().enumerate() {
            let action = &step.action;
            let artifact =
                artifacts
                    .get(&action.artifact)
                    .ok_or_else(|| IgnisError::UnknownArtifact {
                        name: action.artifact.clone(),
                    })?;

            let args = self.resolve_args(action)?;

            let pending = JournalEntry::pending(
                action.id.clone(),
                action.artifact.as_str(),
                action_fingerprint(action, self.address_book, self.network),
            );
            self.journal.put(pending.clone())?;

            tracing::info!(
                action = %action.id,
                artifact = %action.artifact,
                step = position + 1,
                total,
                "Deploying contract..."
            );

            match self.backend.deploy(artifact, &args, action.value).await {
                Ok(address) => {
                    tracing::info!(action = %action.id, address = %address, "Contract deployed");
                    self.journal.put(pending.deployed(address)).map_err(|err| {
                        tracing::error!(action = %action.id, address = %address, error = %err, "Failed to record deployed contract");
                        IgnisError::Journal(format!(
                            "{} was deployed at {address} but could not be recorded: {err}",
                            action.id
                        ))
                    })?;
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    self.journal.put(pending.failed(reason.as_str()))?;
                    tracing::error!(action = %action.id, error = %reason, "Deployment failed, aborting plan");
                    return Err(IgnisError::DeploymentFailure {
                        action: action.id.clone(),
                        reason,
                    });
                }
            }
        }

        Ok(())
    }

    /// Turn argument specs into concrete values.
    ///
    /// References are read from the journal; plan ordering guarantees they are
    /// already deployed.
    fn resolve_args(&self, action: &DeployAction) -> Result<Vec<DeployArg>> {
        action
            .args
            .iter()
            .map(|arg| match arg {
                ArgumentSpec::Literal(value) => Ok(DeployArg::Literal(value.clone())),
                ArgumentSpec::Reference(dependency) => self
                    .journal
                    .get(dependency)
                    .and_then(|entry| entry.deployed_address())
                    .map(DeployArg::Address)
                    .ok_or_else(|| IgnisError::UnresolvedDependency {
                        action: action.id.clone(),
                        dependency: dependency.clone(),
                    }),
                ArgumentSpec::NetworkAddress(name) => {
                    resolve_network_address(self.address_book, self.network, name)
                        .map(DeployArg::Address)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::{Address, U256};

    use super::*;
    use crate::{
        ActionId, ActionStatus, ArtifactStore, ContractSpec, DeploymentGraph, InMemoryJournal,
        ModuleBuilder, plan,
    };

    struct FixedBackend(Address);

    impl DeploymentBackend for FixedBackend {
        async fn deploy(
            &self,
            _artifact: &Artifact,
            _args: &[DeployArg],
            _value: Option<U256>,
        ) -> anyhow::Result<Address> {
            Ok(self.0)
        }
    }

    /// Accepts pending entries, rejects everything else.
    #[derive(Default)]
    struct ReadOnlyDiskJournal(InMemoryJournal);

    impl Journal for ReadOnlyDiskJournal {
        fn get(&self, id: &ActionId) -> Option<JournalEntry> {
            self.0.get(id)
        }

        fn put(&mut self, entry: JournalEntry) -> Result<()> {
            if entry.status != ActionStatus::Pending {
                return Err(IgnisError::Journal("disk full".to_string()));
            }
            self.0.put(entry)
        }

        fn all(&self) -> Vec<JournalEntry> {
            self.0.all()
        }

        fn clear(&mut self) -> Result<()> {
            self.0.clear()
        }
    }

    #[tokio::test]
    async fn test_unrecorded_deployment_reports_the_address() {
        let mut module = ModuleBuilder::new("OracleModule");
        let oracle = module.contract(ContractSpec::new("Oracle")).unwrap();
        let graph = DeploymentGraph::build(&[module.build()]).unwrap();

        let book = AddressBook::new();
        let network = NetworkId::new("localhost");
        let mut journal = ReadOnlyDiskJournal::default();
        let plan = plan::plan(&graph, &journal, &book, &network).unwrap();
        let artifacts = HashMap::from([(
            "Oracle".to_string(),
            ArtifactStore::parse("Oracle", r#"{"abi":[],"bytecode":"0x6080"}"#).unwrap(),
        )]);

        let address = Address::with_last_byte(0x42);
        let err = Executor::new(&FixedBackend(address), &mut journal, &book, &network)
            .execute(&plan, &artifacts)
            .await
            .unwrap_err();

        assert!(matches!(err, IgnisError::Journal(_)), "{err}");
        assert!(
            err.to_string().contains(&address.to_string()),
            "The error must carry the address of the live contract: {err}"
        );
        assert_eq!(journal.get(&oracle).unwrap().status, ActionStatus::Pending);
    }
}
