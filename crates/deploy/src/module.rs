//! Declarative module definitions.
//!
//! A module is a named bundle of contract deployments. Modules are built with a
//! [`ModuleBuilder`], which validates every reference as soon as a contract is
//! registered, and are immutable afterwards.
//!
//! ```
//! use ignis_deploy::{ContractSpec, ModuleBuilder};
//!
//! # fn main() -> ignis_deploy::Result<()> {
//! let mut oracle = ModuleBuilder::new("OracleModule");
//! oracle.contract(ContractSpec::new("Oracle"))?;
//! let oracle = oracle.build();
//!
//! let mut use_case = ModuleBuilder::new("UseCaseExampleModule");
//! let imported = use_case.use_module(&oracle);
//! use_case.contract(ContractSpec::new("UseCaseExample").arg(imported.contract("Oracle")?))?;
//! let _use_case = use_case.build();
//! # Ok(())
//! # }
//! ```

use std::{collections::BTreeSet, fmt, str::FromStr, sync::Arc};

use alloy_core::primitives::U256;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{IgnisError, Result};

/// Separator between the module id and the local contract name in an [`ActionId`].
pub const ACTION_ID_SEPARATOR: char = '#';

/// Unique identifier of a module.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ModuleId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a single deployment, formatted as `<module>#<contract>`.
///
/// Derived only from the module id and the local contract name, so the same
/// definition always yields the same id across runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionId {
    module: ModuleId,
    name: String,
}

impl ActionId {
    pub fn new(module: impl Into<ModuleId>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        let module = self.module.as_str();
        if module.is_empty()
            || self.name.is_empty()
            || module.contains(ACTION_ID_SEPARATOR)
            || self.name.contains(ACTION_ID_SEPARATOR)
        {
            return Err(IgnisError::InvalidActionId(self.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.module, ACTION_ID_SEPARATOR, self.name)
    }
}

impl FromStr for ActionId {
    type Err = IgnisError;

    fn from_str(s: &str) -> Result<Self> {
        let (module, name) = s
            .split_once(ACTION_ID_SEPARATOR)
            .ok_or_else(|| IgnisError::InvalidActionId(s.to_string()))?;
        let id = Self::new(module, name);
        id.validate()?;
        Ok(id)
    }
}

impl TryFrom<String> for ActionId {
    type Error = IgnisError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ActionId> for String {
    fn from(id: ActionId) -> Self {
        id.to_string()
    }
}

/// How a single constructor argument is obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentSpec {
    /// A value passed to the backend unchanged.
    Literal(Value),
    /// The address of another deployed action.
    Reference(ActionId),
    /// A well-known address looked up in the address book of the active network.
    NetworkAddress(String),
}

impl ArgumentSpec {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn network_address(name: impl Into<String>) -> Self {
        Self::NetworkAddress(name.into())
    }

    /// The referenced action, if this argument is a reference.
    pub fn reference(&self) -> Option<&ActionId> {
        match self {
            Self::Reference(id) => Some(id),
            _ => None,
        }
    }
}

impl From<ActionId> for ArgumentSpec {
    fn from(id: ActionId) -> Self {
        Self::Reference(id)
    }
}

impl From<&ActionId> for ArgumentSpec {
    fn from(id: &ActionId) -> Self {
        Self::Reference(id.clone())
    }
}

impl From<Value> for ArgumentSpec {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// A single contract deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployAction {
    pub id: ActionId,
    /// Name of the compiled artifact to deploy.
    pub artifact: String,
    /// Ordered constructor arguments.
    pub args: Vec<ArgumentSpec>,
    /// Native value (wei) sent with the deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Ordering-only dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<ActionId>,
}

impl DeployAction {
    /// Every action this one depends on, deduplicated, in id order.
    pub fn dependencies(&self) -> BTreeSet<&ActionId> {
        self.args
            .iter()
            .filter_map(ArgumentSpec::reference)
            .chain(self.after.iter())
            .collect()
    }
}

/// Description of a contract to register in a module.
#[derive(Debug, Clone)]
pub struct ContractSpec {
    name: String,
    artifact: Option<String>,
    args: Vec<ArgumentSpec>,
    value: Option<U256>,
    after: Vec<ActionId>,
}

impl ContractSpec {
    /// A contract whose local name is also its artifact name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact: None,
            args: Vec::new(),
            value: None,
            after: Vec::new(),
        }
    }

    /// Deploy a different artifact than the local name.
    pub fn artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: impl Into<ArgumentSpec>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several constructor arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = ArgumentSpec>) -> Self {
        self.args.extend(args);
        self
    }

    /// Attach native value to the deployment.
    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// Deploy only after `action`, without passing its address.
    pub fn after(mut self, action: impl Into<ActionId>) -> Self {
        self.after.push(action.into());
        self
    }
}

impl From<&ActionId> for ActionId {
    fn from(id: &ActionId) -> Self {
        id.clone()
    }
}

/// An immutable, validated module.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDefinition {
    id: ModuleId,
    actions: Vec<DeployAction>,
    imports: Vec<Arc<ModuleDefinition>>,
}

impl ModuleDefinition {
    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Actions in registration order.
    pub fn actions(&self) -> &[DeployAction] {
        &self.actions
    }

    /// Directly imported modules, in import order.
    pub fn imports(&self) -> &[Arc<ModuleDefinition>] {
        &self.imports
    }

    pub fn action(&self, name: &str) -> Option<&DeployAction> {
        self.actions.iter().find(|action| action.id.name() == name)
    }
}

/// Handle to an imported module, used to reference its contracts.
#[derive(Debug, Clone)]
pub struct ModuleImport {
    module: Arc<ModuleDefinition>,
}

impl ModuleImport {
    pub fn id(&self) -> &ModuleId {
        self.module.id()
    }

    /// Reference a contract of the imported module.
    pub fn contract(&self, name: &str) -> Result<ActionId> {
        self.module
            .action(name)
            .map(|action| action.id.clone())
            .ok_or_else(|| IgnisError::UndefinedReference {
                reference: ActionId::new(self.module.id().clone(), name).to_string(),
                context: format!("imported module {}", self.module.id()),
            })
    }
}

/// Builder for a [`ModuleDefinition`].
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    id: ModuleId,
    actions: Vec<DeployAction>,
    imports: Vec<Arc<ModuleDefinition>>,
}

impl ModuleBuilder {
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            actions: Vec::new(),
            imports: Vec::new(),
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    /// Import another module so its contracts can be referenced.
    pub fn use_module(&mut self, module: &Arc<ModuleDefinition>) -> ModuleImport {
        let already_imported = self
            .imports
            .iter()
            .any(|imported| Arc::ptr_eq(imported, module) || imported == module);
        if !already_imported {
            self.imports.push(Arc::clone(module));
        }

        ModuleImport {
            module: Arc::clone(module),
        }
    }

    /// Register a contract deployment and return its id.
    ///
    /// Fails with [`IgnisError::UndefinedReference`] when an argument or `after`
    /// entry points at a contract that is neither registered earlier in this
    /// module nor exported by an imported module.
    pub fn contract(&mut self, spec: ContractSpec) -> Result<ActionId> {
        let id = ActionId::new(self.id.clone(), spec.name.as_str());
        id.validate()?;

        if self.actions.iter().any(|action| action.id == id) {
            return Err(IgnisError::DuplicateAction {
                module: self.id.clone(),
                name: spec.name,
            });
        }

        let action = DeployAction {
            artifact: spec.artifact.unwrap_or_else(|| spec.name.clone()),
            id: id.clone(),
            args: spec.args,
            value: spec.value,
            after: spec.after,
        };

        for dependency in action.dependencies() {
            self.check_reference(&id, dependency)?;
        }

        tracing::trace!(action = %id, artifact = %action.artifact, "Registered contract");
        self.actions.push(action);

        Ok(id)
    }

    /// Freeze the module.
    pub fn build(self) -> Arc<ModuleDefinition> {
        Arc::new(ModuleDefinition {
            id: self.id,
            actions: self.actions,
            imports: self.imports,
        })
    }

    fn check_reference(&self, from: &ActionId, reference: &ActionId) -> Result<()> {
        let known = if reference.module() == &self.id {
            self.actions.iter().any(|action| &action.id == reference)
        } else {
            self.imports
                .iter()
                .filter(|module| module.id() == reference.module())
                .any(|module| module.action(reference.name()).is_some())
        };

        if known {
            Ok(())
        } else {
            Err(IgnisError::UndefinedReference {
                reference: reference.to_string(),
                context: from.to_string(),
            })
        }
    }
}
