//! ignis-deploy - Declarative, resumable smart contract deployments.
//!
//! Modules declare contracts and how they depend on each other. The engine
//! expands module imports into a dependency graph, plans the deployment in
//! topological order against a persistent journal, and submits each contract
//! through a [`DeploymentBackend`]. Re-running a deployment only submits what
//! the journal does not record as deployed.

mod address_book;
pub use address_book::{AddressBook, NetworkId};

mod artifacts;
pub use artifacts::{Artifact, ArtifactProvider, ArtifactStore};

pub mod backend;
pub use backend::{DeployArg, DeploymentBackend, ForgeBackend, ForgeConfig};

mod deployer;
pub use deployer::{ContractHandle, DeploymentResult, Deployer};

pub mod deployment_hash;

mod error;
pub use error::{IgnisError, Result};

pub mod executor;
pub use executor::preflight;

mod fs;

mod graph;
pub use graph::{DependencyEdge, DeploymentGraph};

pub mod journal;
pub use journal::{ActionStatus, FileJournal, InMemoryJournal, Journal, JournalEntry};

pub mod manifest;
pub use manifest::ModuleManifest;

mod module;
pub use module::{
    ACTION_ID_SEPARATOR, ActionId, ArgumentSpec, ContractSpec, DeployAction, ModuleBuilder,
    ModuleDefinition, ModuleId, ModuleImport,
};

pub mod plan;
pub use plan::{ExecutionPlan, PlannedStep};

pub mod rpc;
