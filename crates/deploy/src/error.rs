//! Error taxonomy for the deployment engine.

use crate::{ActionId, ModuleId, NetworkId};

/// Result alias used across the engine.
pub type Result<T, E = IgnisError> = std::result::Result<T, E>;

/// Errors raised while defining, planning or executing a deployment.
///
/// Definition-time variants (`UndefinedReference`, `DuplicateAction`,
/// `DuplicateModule`, `CyclicDependency`) and preflight variants
/// (`UnknownArtifact`, `UnknownNetworkAddress`, `ArgumentCount`,
/// `Reconciliation`) are always raised before the deployment backend is called.
#[derive(Debug, thiserror::Error)]
pub enum IgnisError {
    #[error("undefined reference to `{reference}` in {context}")]
    UndefinedReference { reference: String, context: String },

    #[error("cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("{action} depends on {dependency}, which is not resolved in the deployment graph")]
    UnresolvedDependency {
        action: ActionId,
        dependency: ActionId,
    },

    #[error("unknown artifact `{name}`")]
    UnknownArtifact { name: String },

    #[error("invalid artifact `{name}`: {reason}")]
    InvalidArtifact { name: String, reason: String },

    #[error("no address named `{name}` in the address book for network `{network}`")]
    UnknownNetworkAddress { network: NetworkId, name: String },

    #[error("deployment of {action} failed: {reason}")]
    DeploymentFailure { action: ActionId, reason: String },

    #[error("contract `{name}` is registered twice in module {module}")]
    DuplicateAction { module: ModuleId, name: String },

    #[error("module id {module} is used by two different module definitions")]
    DuplicateModule { module: ModuleId },

    #[error("{action} passes {given} constructor arguments but `{artifact}` expects {expected}")]
    ArgumentCount {
        action: ActionId,
        artifact: String,
        expected: usize,
        given: usize,
    },

    #[error(
        "{action} was already deployed with a different definition; reset the deployment to redeploy it"
    )]
    Reconciliation { action: ActionId },

    #[error("invalid action id `{0}`: expected `<module>#<contract>`")]
    InvalidActionId(String),

    #[error("invalid module manifest: {0}")]
    InvalidManifest(String),

    #[error("journal error: {0}")]
    Journal(String),
}

impl IgnisError {
    /// The action this error is attributed to, if any.
    pub fn action(&self) -> Option<&ActionId> {
        match self {
            Self::UnresolvedDependency { action, .. }
            | Self::DeploymentFailure { action, .. }
            | Self::ArgumentCount { action, .. }
            | Self::Reconciliation { action } => Some(action),
            _ => None,
        }
    }
}
