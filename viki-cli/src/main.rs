//! Viki CLI
//!
//! Command-line interface for listing, running and inspecting viki jobs.

mod bootstrap;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "viki=info,viki_engine=info,viki_runner=info";

#[derive(Parser)]
#[command(name = "viki")]
#[command(about = "Viki automation framework CLI", long_about = None)]
struct Cli {
    /// Viki home directory (defaults to ~/.viki)
    #[arg(long, env = "VIKI_HOME", global = true)]
    home: Option<PathBuf>,

    /// Kill jobs that run longer than this many seconds
    #[arg(long, env = "VIKI_JOB_TIMEOUT", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.home, cli.timeout)?;

    init_logging(&config);

    tracing::debug!("Using viki home {}", config.home_dir.display());

    handle_command(cli.command, &config).await
}

/// Sends logs to the viki log file when it exists, otherwise warnings to stderr
fn init_logging(config: &Config) {
    let log_file = OpenOptions::new().append(true).open(&config.log_file).ok();

    match log_file {
        Some(file) => tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init(),
        None => tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
