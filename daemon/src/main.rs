//! Seal daemon: entry point for running a Seal node.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::RngCore;
use seal_flows::StaticIdentityService;
use seal_network::MemoryNetwork;
use seal_node::{init_logging, NodeConfig, NodeServices, SealNode};
use seal_types::SystemClock;

#[derive(Parser)]
#[command(name = "seal-daemon", about = "Seal notarisation node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; flags
    /// and env vars override them.
    #[arg(long, env = "SEAL_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for LMDB storage.
    #[arg(long, env = "SEAL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SEAL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SEAL_LOG_FORMAT")]
    log_format: Option<String>,

    /// Run the notary service on this node.
    #[arg(long, env = "SEAL_NOTARY")]
    notary: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a standalone node until SIGINT/SIGTERM.
    Run,
    /// Inspect configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print a fresh identity seed and its public key.
    Keygen,
}

#[derive(clap::Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Validate the configuration and print the node identity.
    Check,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.notary.enabled |= cli.notary;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Keygen => {
            let seed = fresh_seed();
            let keys = seal_crypto::keypair_from_seed(&seed);
            println!("identity_seed = \"{}\"", hex::encode(seed));
            println!("# public_key = \"{}\"", hex::encode(keys.public.as_bytes()));
        }
        Command::Config { action } => match action {
            ConfigAction::Show => print!("{}", config.to_toml_string()?),
            ConfigAction::Check => {
                config.log_format()?;
                let keys = config.identity_keys()?;
                let notaries = config.notary_infos()?;
                println!("identity: {} ({})", config.name, keys.public);
                println!("notary service: {}", if config.notary.enabled { "on" } else { "off" });
                for notary in notaries {
                    println!("known notary: {} ({})", notary.party, notary.party.owning_key);
                }
            }
        },
        Command::Run => run(config).await?,
    }

    Ok(())
}

fn fresh_seed() -> [u8; 32] {
    let mut seed = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut seed);
    seed
}

/// Run a single node on an in-process transport. Peers join by embedding
/// the node crate in the same process.
async fn run(mut config: NodeConfig) -> anyhow::Result<()> {
    init_logging(config.log_format()?, &config.log_level)?;

    if config.identity_seed.is_none() {
        tracing::warn!("no identity_seed configured, this run uses an ephemeral identity");
        config.identity_seed = Some(hex::encode(fresh_seed()));
    }

    let keys = config.identity_keys()?;
    let me = config.identity(&keys);
    let identities = Arc::new(StaticIdentityService::new());
    identities.register(me.clone());
    for notary in config.notary_infos()? {
        identities.register(notary.party);
    }

    let network = MemoryNetwork::new();
    let (transport, inbox) = network.join(me.clone());

    tracing::info!(
        node = %me,
        data_dir = %config.data_dir.display(),
        notary = config.notary.enabled,
        "starting Seal node"
    );
    let mut node = SealNode::start(
        config,
        NodeServices {
            transport: Arc::new(transport),
            inbox,
            identities,
            clock: Arc::new(SystemClock),
            verifier: None,
        },
    )
    .await
    .context("starting node")?;

    node.shutdown_controller().wait_for_signal().await?;
    node.stop().await?;
    tracing::info!("Seal daemon exited cleanly");
    Ok(())
}
