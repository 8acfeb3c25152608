mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        short,
        default_value = "lockgate.yaml",
        env = "LOCKGATE_CONFIG_FILE"
    )]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run Lockgate
    Run,
    /// Validate config file
    Check,
    /// Create a password hash for the static credential store
    Hash,
    /// Ping a running instance through the admin API
    Healthcheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run => crate::commands::run::command(&cli).await,
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::Hash => crate::commands::hash::command().await,
        Commands::Healthcheck => crate::commands::healthcheck::command(&cli).await,
    }
}
