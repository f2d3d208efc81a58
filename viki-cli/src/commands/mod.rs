//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod setup;

use anyhow::Result;
use clap::Subcommand;
use colored::*;

use crate::bootstrap;
use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create the viki home, jobs directory, config file and log file
    Setup,
    /// List available jobs
    #[command(visible_aliases = ["l", "ll"])]
    List,
    /// Run a job
    #[command(visible_alias = "r")]
    Run {
        /// Name of the job to run
        job_name: String,

        /// Arguments passed to the job unchanged
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show the output of the last run of a job
    #[command(visible_alias = "o")]
    Output {
        /// Name of the job
        job_name: String,
    },
    /// Show recent runs of a job (requires retain_history)
    History {
        /// Name of the job
        job_name: String,

        /// Maximum number of runs to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Create a new job (not yet implemented)
    #[command(visible_alias = "c")]
    Create {
        /// Name of the job to create
        job_name: String,
    },
    /// Print version information as JSON
    Version,
}

impl Commands {
    /// Whether the command needs a completed `viki setup`
    fn requires_setup(&self) -> bool {
        !matches!(self, Commands::Setup | Commands::Version)
    }
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    if command.requires_setup() && !bootstrap::check_system_setup(config) {
        eprintln!("{}", "System setup check failed".red());
        eprintln!("Please run the viki setup command:");
        eprintln!("    {}", "viki setup".cyan());
        anyhow::bail!("viki is not set up in {}", config.home_dir.display());
    }

    match command {
        Commands::Setup => setup::run_setup(config),
        Commands::Version => print_version(),
        Commands::List => job::list_jobs(config).await,
        Commands::Run { job_name, args } => job::run_job(config, &job_name, args).await,
        Commands::Output { job_name } => job::show_output(config, &job_name).await,
        Commands::History { job_name, limit } => {
            job::show_history(config, &job_name, limit).await
        }
        Commands::Create { job_name } => job::create_job(&job_name),
    }
}

fn print_version() -> Result<()> {
    let version = serde_json::json!({
        "name": "viki",
        "version": bootstrap::VERSION,
    });
    println!("{}", version);
    Ok(())
}
