//! ignis deploys smart contract modules declared in a manifest, resuming where the last run stopped.

mod cli;
mod config;
mod output;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, DeployArgs, OutputFormat, TargetArgs};
use config::{CONFIG_FILENAME, Settings};
use ignis_deploy::{
    ActionId, AddressBook, ArtifactStore, Deployer, DeploymentGraph, FileJournal, ForgeBackend,
    ForgeConfig, InMemoryJournal, Journal, ModuleDefinition, ModuleManifest, NetworkId, plan, preflight, rpc,
};

/// Everything a command needs: configuration, selected modules and target network.
struct Target {
    settings: Settings,
    roots: Vec<Arc<ModuleDefinition>>,
    graph: DeploymentGraph,
    deployment_id: String,
    network: NetworkId,
    format: OutputFormat,
}

impl Target {
    fn load(config: Option<PathBuf>, args: &TargetArgs) -> Result<Self> {
        let config_path = config.unwrap_or_else(|| {
            args.manifest
                .parent()
                .map_or_else(|| PathBuf::from(CONFIG_FILENAME), |dir| dir.join(CONFIG_FILENAME))
        });
        let settings = Settings::load(&config_path)?;

        let manifest = ModuleManifest::load_from_file(&args.manifest)?;
        let roots = manifest
            .build(&args.modules)
            .context("Failed to build modules from the manifest")?;
        let graph = DeploymentGraph::build(&roots)?;
        let deployment_id = args
            .deployment_id
            .clone()
            .unwrap_or_else(|| graph.deployment_id());

        tracing::info!(
            manifest = %args.manifest.display(),
            deployment = %deployment_id,
            network = %args.network,
            actions = graph.len(),
            "Target loaded"
        );

        Ok(Self {
            settings,
            roots,
            graph,
            deployment_id,
            network: NetworkId::new(args.network.as_str()),
            format: args.format,
        })
    }

    fn address_book(&self) -> Result<AddressBook> {
        match &self.settings.address_book {
            Some(path) => AddressBook::load_from_file(path),
            None => Ok(AddressBook::default()),
        }
    }

    fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(self.settings.artifacts_dir.clone())
    }

    fn open_journal(&self) -> Result<FileJournal> {
        FileJournal::open(&self.settings.state_dir, &self.deployment_id, &self.network)
            .context("Failed to open the deployment journal")
    }

    /// Open the journal only if a previous run created it, so read-only commands leave no trace.
    fn existing_journal(&self) -> Result<Option<FileJournal>> {
        let dir = FileJournal::directory(&self.settings.state_dir, &self.deployment_id, &self.network);
        if dir.exists() {
            self.open_journal().map(Some)
        } else {
            Ok(None)
        }
    }

    fn print_json(value: &impl serde::Serialize) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialize output")?
        );
        Ok(())
    }
}

fn run_plan(target: &Target) -> Result<()> {
    let address_book = target.address_book()?;
    let execution_plan = match target.existing_journal()? {
        Some(journal) => plan::plan(&target.graph, &journal, &address_book, &target.network)?,
        None => plan::plan(
            &target.graph,
            &InMemoryJournal::new(),
            &address_book,
            &target.network,
        )?,
    };
    preflight(&execution_plan, &target.artifacts(), &address_book, &target.network)?;

    match target.format {
        OutputFormat::Json => Target::print_json(&execution_plan)?,
        OutputFormat::Table => {
            println!("{}", output::plan_table(&execution_plan));
            println!(
                "{} action(s) to execute, {} already deployed",
                execution_plan.len(),
                execution_plan.satisfied.len()
            );
        }
    }
    Ok(())
}

async fn run_deploy(target: &Target, args: &DeployArgs) -> Result<()> {
    let network = target.settings.network(target.network.as_str())?;
    let rpc_url = network.rpc_url()?;

    match network.chain_id {
        Some(chain_id) if !args.skip_chain_check => {
            rpc::ensure_chain_id(&rpc_url, chain_id).await?;
        }
        _ => tracing::warn!(network = %target.network, "Chain id not verified"),
    }

    let journal = target.open_journal()?;
    tracing::debug!(path = %journal.path().display(), "Journal opened");

    let backend = ForgeBackend::new(ForgeConfig {
        binary: target.settings.forge.binary.clone(),
        project_root: target.settings.project_root(),
        rpc_url,
        private_key: args.private_key.clone(),
    });

    let mut deployer = Deployer::new(target.network.clone(), target.artifacts(), backend, journal)
        .with_address_book(target.address_book()?);
    let result = if args.reset {
        deployer.redeploy(&target.roots).await
    } else {
        deployer.deploy(&target.roots).await
    };

    // Addresses are written even after a failure so completed work is visible.
    let addresses_path = deployer.journal().write_deployed_addresses()?;
    let result = result?;

    match target.format {
        OutputFormat::Json => Target::print_json(&result)?,
        OutputFormat::Table => println!("{}", output::result_table(&result)),
    }

    tracing::info!(
        path = %addresses_path.display(),
        executed = result.executed.len(),
        "Deployed addresses written"
    );
    Ok(())
}

fn run_status(target: &Target) -> Result<()> {
    let journal = target.existing_journal()?;
    let entry = |id: &ActionId| journal.as_ref().and_then(|journal| journal.get(id));

    match target.format {
        OutputFormat::Json => {
            let entries: Vec<_> = target
                .graph
                .actions()
                .iter()
                .filter_map(|action| entry(&action.id))
                .collect();
            Target::print_json(&entries)?;
        }
        OutputFormat::Table => {
            let rows = target
                .graph
                .actions()
                .iter()
                .map(|action| (action, entry(&action.id)));
            println!("{}", output::status_table(rows));
        }
    }
    Ok(())
}

fn run_addresses(target: &Target) -> Result<()> {
    let addresses = target
        .existing_journal()?
        .map(|journal| journal.deployed_addresses())
        .unwrap_or_default();
    Target::print_json(&addresses)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Plan(args) => run_plan(&Target::load(cli.config.clone(), args)?),
        Command::Deploy(args) => {
            let target = Target::load(cli.config.clone(), &args.target)?;
            run_deploy(&target, args).await
        }
        Command::Status(args) => run_status(&Target::load(cli.config.clone(), args)?),
        Command::Addresses(args) => run_addresses(&Target::load(cli.config.clone(), args)?),
    }
}
