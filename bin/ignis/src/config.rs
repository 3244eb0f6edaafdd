use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use ignis_deploy::backend::forge::DEFAULT_FORGE_BINARY;
use serde::{Deserialize, Serialize};
use url::Url;

/// The default name for the ignis configuration file.
pub const CONFIG_FILENAME: &str = "Ignis.toml";

/// Prefix of the environment variables overriding the configuration file.
const ENV_PREFIX: &str = "IGNIS_";

/// Environment variables consumed by the CLI itself.
const CLI_ENV_KEYS: &[&str] = &[
    "verbosity",
    "config",
    "network",
    "deployment_id",
    "private_key",
    "reset",
];

/// Project configuration, read from `Ignis.toml` and `IGNIS_*` variables.
///
/// Relative paths are resolved against the directory of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Where journals are stored.
    pub state_dir: PathBuf,
    /// Compiled artifacts (Foundry `out/` or Hardhat `artifacts/`).
    pub artifacts_dir: PathBuf,
    /// Optional address book (TOML, one table per network).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_book: Option<PathBuf>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkSettings>,
    #[serde(default)]
    pub forge: ForgeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub rpc_url: String,
    /// Expected chain id; checked against the endpoint before deploying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl NetworkSettings {
    pub fn rpc_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.rpc_url).context(format!("Invalid RPC URL: {}", self.rpc_url))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeSettings {
    pub binary: PathBuf,
    /// Foundry project root. Defaults to the configuration directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
}

impl Default for ForgeSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_FORGE_BINARY),
            project_root: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("ignition"),
            artifacts_dir: PathBuf::from("out"),
            address_book: None,
            networks: BTreeMap::new(),
            forge: ForgeSettings::default(),
        }
    }
}

impl Settings {
    /// Load the configuration file at `path` (which may be missing), then apply
    /// environment overrides.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(CLI_ENV_KEYS))
            .extract()
            .context(format!("Failed to load configuration from {}", path.display()))?;

        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        tracing::debug!(path = %path.display(), networks = settings.networks.len(), "Configuration loaded");
        Ok(settings.resolve_paths(base))
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |path: &Path| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base.join(path)
            }
        };

        self.state_dir = resolve(&self.state_dir);
        self.artifacts_dir = resolve(&self.artifacts_dir);
        self.address_book = self.address_book.as_deref().map(resolve);
        self.forge.project_root = Some(
            self.forge
                .project_root
                .as_deref()
                .map_or_else(|| base.to_path_buf(), resolve),
        );
        self
    }

    pub fn network(&self, name: &str) -> anyhow::Result<&NetworkSettings> {
        self.networks.get(name).with_context(|| {
            format!(
                "Network `{name}` is not configured (known networks: {})",
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    pub fn project_root(&self) -> PathBuf {
        self.forge
            .project_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
