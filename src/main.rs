//! petlife - inspect FHEPetLife deployments and cached decryption authorizations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use petlife::cli::{
    AuthCommand, DeploymentsCommand, run_auth_command, run_binding_command,
    run_deployments_command,
};
use petlife::config::{CONFIG_PATH_ENV, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "petlife")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file (default: ~/.petlife/config.toml)
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the FHEPetLife binding for a chain
    Binding {
        /// Chain id to resolve; omit to see the unresolved binding
        #[arg(long)]
        chain_id: Option<u64>,

        /// Print the binding as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the deployment table
    #[command(subcommand)]
    Deployments(DeploymentsCommand),

    /// Manage cached decryption authorizations
    #[command(subcommand)]
    Auth(AuthCommand),
}

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("petlife=info"));
    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::resolve()? {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    petlife::bootstrap::load_petlife_env();
    init_tracing()?;

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Binding { chain_id, json } => run_binding_command(config_path, chain_id, json),
        Command::Deployments(command) => run_deployments_command(config_path, command),
        Command::Auth(command) => run_auth_command(config_path, command).await,
    }
}
