//! Deployment backend running Foundry's `forge create`.

mod cmd;

use std::{fmt, path::PathBuf};

use alloy_core::primitives::{Address, U256};
use anyhow::Context;
use serde::Deserialize;
use url::Url;

pub use cmd::ForgeCreateCmdBuilder;

use super::{DeployArg, DeploymentBackend};
use crate::Artifact;

/// Default `forge` binary, resolved through `PATH`.
pub const DEFAULT_FORGE_BINARY: &str = "forge";

/// Configuration for the `forge create` backend.
#[derive(Clone)]
pub struct ForgeConfig {
    /// Path to the `forge` binary.
    pub binary: PathBuf,
    /// Foundry project root the contracts are compiled from.
    pub project_root: PathBuf,
    /// RPC endpoint of the target network.
    pub rpc_url: Url,
    /// Key of the deployer account. Never logged.
    pub private_key: String,
}

impl fmt::Debug for ForgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForgeConfig")
            .field("binary", &self.binary)
            .field("project_root", &self.project_root)
            .field("rpc_url", &self.rpc_url.as_str())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// JSON printed by `forge create --json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgeCreateOutput {
    deployed_to: Address,
    #[serde(default)]
    transaction_hash: Option<String>,
}

impl ForgeCreateOutput {
    /// Forge may print compiler output before the JSON line; take the last JSON object.
    fn parse(stdout: &str) -> anyhow::Result<Self> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .context("forge create did not print a JSON result")?;

        serde_json::from_str(line).context("Failed to parse forge create output")
    }
}

/// Backend that deploys each contract with one `forge create` invocation.
#[derive(Debug, Clone)]
pub struct ForgeBackend {
    config: ForgeConfig,
}

impl ForgeBackend {
    pub fn new(config: ForgeConfig) -> Self {
        Self { config }
    }

    fn command(
        &self,
        artifact: &Artifact,
        args: &[DeployArg],
        value: Option<U256>,
    ) -> Vec<String> {
        ForgeCreateCmdBuilder::new(
            artifact.name.as_str(),
            self.config.rpc_url.as_str(),
            self.config.private_key.as_str(),
        )
        .root(&self.config.project_root)
        .value(value)
        .constructor_args(args.iter().map(ToString::to_string))
        .build()
    }
}

impl DeploymentBackend for ForgeBackend {
    async fn deploy(
        &self,
        artifact: &Artifact,
        args: &[DeployArg],
        value: Option<U256>,
    ) -> anyhow::Result<Address> {
        let cmd = self.command(artifact, args, value);

        tracing::debug!(
            binary = %self.config.binary.display(),
            contract = %artifact.name,
            args = args.len(),
            "Running forge create"
        );

        let output = tokio::process::Command::new(&self.config.binary)
            .args(&cmd)
            .current_dir(&self.config.project_root)
            .kill_on_drop(true)
            .output()
            .await
            .context(format!(
                "Failed to run {}",
                self.config.binary.display()
            ))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "forge create exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = ForgeCreateOutput::parse(&stdout)?;

        tracing::debug!(
            contract = %artifact.name,
            address = %result.deployed_to,
            tx_hash = ?result.transaction_hash,
            "forge create completed"
        );

        Ok(result.deployed_to)
    }
}
