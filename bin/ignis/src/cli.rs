use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "ignis")]
#[command(
    author,
    version,
    about = "Declarative, resumable smart contract deployments"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "IGNIS_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file.
    ///
    /// If not provided, `Ignis.toml` next to the manifest is used when it exists.
    #[arg(short, long, global = true, env = "IGNIS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the actions a deploy would execute, without sending anything.
    Plan(TargetArgs),

    /// Deploy the selected modules, resuming from the journal.
    Deploy(DeployArgs),

    /// Show the journal status of every action.
    Status(TargetArgs),

    /// Print the addresses of deployed contracts as JSON.
    Addresses(TargetArgs),
}

/// What to deploy, and where.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Path to the module manifest (TOML, or JSON with a `.json` extension).
    pub manifest: PathBuf,

    /// The target network, as named in the configuration file.
    #[arg(short, long, env = "IGNIS_NETWORK")]
    pub network: String,

    /// Root modules to deploy. Can be repeated.
    ///
    /// If not provided, every module no other module imports is a root.
    #[arg(short, long = "module")]
    pub modules: Vec<String>,

    /// Identifier of the deployment, which selects its journal.
    ///
    /// If not provided, the root module ids joined with `+`.
    #[arg(long, env = "IGNIS_DEPLOYMENT_ID")]
    pub deployment_id: Option<String>,

    /// Output format.
    #[arg(long, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Private key of the deployer account.
    #[arg(long, env = "IGNIS_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Forget previous outcomes and deploy everything again.
    #[arg(long, env = "IGNIS_RESET", default_value_t = false)]
    pub reset: bool,

    /// Skip the check that the RPC endpoint serves the configured chain id.
    #[arg(long, default_value_t = false)]
    pub skip_chain_check: bool,
}
