//! Wallet Pulse - on-chain wallet intelligence engine
//!
//! Classifies monitored wallets' transactions into trade events and runs
//! behavioral detectors over them: reload prediction, cabal clustering,
//! contrarian analysis, alpha decay, and pattern anomalies.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

// Use the library crate
use wallet_pulse::cli::commands;
use wallet_pulse::config::Config;

/// Wallet intelligence engine
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start monitoring wallets
    Start {
        /// Replay transactions from a normalized JSON file instead of
        /// polling a live source
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Run a single scan cycle per chain, then exit
        #[arg(long)]
        once: bool,
    },

    /// Show the effective configuration
    Config,

    /// List configured wallets
    Wallets,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_pulse=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Start { replay, once } => {
            commands::start(&config, replay.as_deref(), once).await
        }
        Commands::Config => commands::show_config(&config),
        Commands::Wallets => commands::wallets(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
