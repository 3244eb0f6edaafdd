use std::{collections::BTreeMap, sync::Arc};

use alloy_core::primitives::Address;
use serde::Serialize;

use crate::{
    ActionId, AddressBook, ArtifactProvider, DeploymentBackend, DeploymentGraph, ExecutionPlan,
    IgnisError, InMemoryJournal, Journal, ModuleDefinition, ModuleId, NetworkId, Result, executor,
    plan,
};

/// A deployed contract, as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractHandle {
    pub address: Address,
    pub artifact: String,
}

/// Outputs of a successful deployment: every contract of every expanded module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentResult {
    pub modules: BTreeMap<ModuleId, BTreeMap<String, ContractHandle>>,
    /// Actions submitted during this run, in execution order.
    #[serde(skip)]
    pub executed: Vec<ActionId>,
}

impl DeploymentResult {
    pub fn contract(&self, id: &ActionId) -> Option<&ContractHandle> {
        self.modules.get(id.module())?.get(id.name())
    }

    /// Module outputs keyed by local contract name.
    pub fn module(&self, id: &ModuleId) -> Option<&BTreeMap<String, ContractHandle>> {
        self.modules.get(id)
    }

    /// Flat `Module#Name -> address` view.
    pub fn addresses(&self) -> BTreeMap<String, Address> {
        self.modules
            .iter()
            .flat_map(|(module, contracts)| {
                contracts.iter().map(move |(name, handle)| {
                    (ActionId::new(module.clone(), name.as_str()).to_string(), handle.address)
                })
            })
            .collect()
    }
}

/// Main entry point: plans and applies module deployments to one network.
///
/// The deployer owns the journal of a single (deployment, network) pair. Running
/// [`Deployer::deploy`] twice with the same modules submits nothing the second time.
pub struct Deployer<A, B, J> {
    network: NetworkId,
    artifacts: A,
    backend: B,
    journal: J,
    address_book: AddressBook,
}

impl<A, B, J> Deployer<A, B, J>
where
    A: ArtifactProvider,
    B: DeploymentBackend,
    J: Journal,
{
    pub fn new(network: impl Into<NetworkId>, artifacts: A, backend: B, journal: J) -> Self {
        Self {
            network: network.into(),
            artifacts,
            backend,
            journal,
            address_book: AddressBook::default(),
        }
    }

    /// Use `address_book` to resolve network addresses.
    pub fn with_address_book(mut self, address_book: AddressBook) -> Self {
        self.address_book = address_book;
        self
    }

    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    pub fn journal(&self) -> &J {
        &self.journal
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_journal(self) -> J {
        self.journal
    }

    /// Forget every recorded outcome so the next deploy starts from scratch.
    ///
    /// Prefer [`Deployer::redeploy`], which only clears the journal once the
    /// new deployment has passed its checks.
    pub fn reset(&mut self) -> Result<()> {
        tracing::warn!(network = %self.network, "Resetting deployment journal");
        self.journal.clear()
    }

    /// Compute what [`Deployer::deploy`] would do, without calling the backend.
    ///
    /// Runs every preflight check, so a plan that succeeds here only fails
    /// later because of the network.
    pub fn plan(&self, roots: &[Arc<ModuleDefinition>]) -> Result<ExecutionPlan> {
        let graph = DeploymentGraph::build(roots)?;
        let plan = plan::plan(&graph, &self.journal, &self.address_book, &self.network)?;
        executor::preflight(&plan, &self.artifacts, &self.address_book, &self.network)?;
        Ok(plan)
    }

    /// Deploy `roots` and their imports, skipping what the journal already records.
    pub async fn deploy(&mut self, roots: &[Arc<ModuleDefinition>]) -> Result<DeploymentResult> {
        self.run(roots, false).await
    }

    /// Deploy `roots` and their imports from scratch, ignoring previous outcomes.
    ///
    /// The journal is planned as if empty and only cleared once preflight
    /// succeeds, so a definition error leaves the previous records untouched.
    pub async fn redeploy(&mut self, roots: &[Arc<ModuleDefinition>]) -> Result<DeploymentResult> {
        self.run(roots, true).await
    }

    async fn run(
        &mut self,
        roots: &[Arc<ModuleDefinition>],
        from_scratch: bool,
    ) -> Result<DeploymentResult> {
        let graph = DeploymentGraph::build(roots)?;

        tracing::info!(
            deployment = %graph.deployment_id(),
            network = %self.network,
            actions = graph.len(),
            from_scratch,
            "Starting deployment process..."
        );

        let plan = if from_scratch {
            plan::plan(&graph, &InMemoryJournal::new(), &self.address_book, &self.network)?
        } else {
            plan::plan(&graph, &self.journal, &self.address_book, &self.network)?
        };
        let artifacts =
            executor::preflight(&plan, &self.artifacts, &self.address_book, &self.network)?;

        if from_scratch {
            self.reset()?;
        }

        if plan.is_empty() {
            tracing::info!("All contracts already deployed, nothing to do");
        } else {
            tracing::info!(
                pending = plan.len(),
                skipped = plan.satisfied.len(),
                "Applying execution plan..."
            );
            executor::Executor::new(
                &self.backend,
                &mut self.journal,
                &self.address_book,
                &self.network,
            )
            .execute(&plan, &artifacts)
            .await?;
        }

        let mut result = self.collect_outputs(&graph)?;
        result.executed = plan.action_ids().into_iter().cloned().collect();

        tracing::info!(
            deployment = %graph.deployment_id(),
            network = %self.network,
            executed = result.executed.len(),
            "Deployment complete"
        );

        Ok(result)
    }

    fn collect_outputs(&self, graph: &DeploymentGraph) -> Result<DeploymentResult> {
        let mut result = DeploymentResult::default();

        for (module, actions) in graph.modules() {
            let outputs = result.modules.entry(module.clone()).or_default();
            for action in actions {
                let address = self
                    .journal
                    .get(&action.id)
                    .and_then(|entry| entry.deployed_address())
                    .ok_or_else(|| {
                        IgnisError::Journal(format!("no deployed address recorded for {}", action.id))
                    })?;
                outputs.insert(
                    action.id.name().to_string(),
                    ContractHandle {
                        address,
                        artifact: action.artifact.clone(),
                    },
                );
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{Artifact, ArtifactStore, ContractSpec, DeployArg, InMemoryJournal, ModuleBuilder};
    use alloy_core::primitives::U256;

    struct NoBackend;

    impl DeploymentBackend for NoBackend {
        async fn deploy(
            &self,
            artifact: &Artifact,
            _args: &[DeployArg],
            _value: Option<U256>,
        ) -> anyhow::Result<Address> {
            anyhow::bail!("unexpected deployment of {}", artifact.name)
        }
    }

    fn artifacts() -> HashMap<String, Artifact> {
        let oracle =
            ArtifactStore::parse("Oracle", r#"{"abi":[],"bytecode":"0x6080"}"#).unwrap();
        HashMap::from([("Oracle".to_string(), oracle)])
    }

    fn oracle_module() -> Arc<ModuleDefinition> {
        let mut module = ModuleBuilder::new("OracleModule");
        module.contract(ContractSpec::new("Oracle")).unwrap();
        module.build()
    }

    #[test]
    fn test_plan_is_a_dry_run() {
        let deployer = Deployer::new("local", artifacts(), NoBackend, InMemoryJournal::new());

        let plan = deployer.plan(&[oracle_module()]).unwrap();

        assert_eq!(plan.len(), 1);
        assert!(
            deployer.journal().all().is_empty(),
            "Planning must not write to the journal"
        );
    }

    #[test]
    fn test_plan_reports_missing_artifact() {
        let deployer = Deployer::new("local", HashMap::new(), NoBackend, InMemoryJournal::new());

        let err = deployer.plan(&[oracle_module()]).unwrap_err();
        assert!(matches!(err, IgnisError::UnknownArtifact { ref name } if name == "Oracle"));
    }

    #[test]
    fn test_result_addresses_are_keyed_by_action_id() {
        let mut result = DeploymentResult::default();
        result.modules.entry(ModuleId::new("OracleModule")).or_default().insert(
            "Oracle".to_string(),
            ContractHandle {
                address: Address::with_last_byte(7),
                artifact: "Oracle".to_string(),
            },
        );

        let id = ActionId::new("OracleModule", "Oracle");
        assert_eq!(
            result.contract(&id).map(|handle| handle.address),
            Some(Address::with_last_byte(7))
        );
        assert_eq!(
            result.addresses().get("OracleModule#Oracle"),
            Some(&Address::with_last_byte(7))
        );
    }
}
