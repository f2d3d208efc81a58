//! Setup command handler
//!
//! Creates the home directory, jobs directory, config file and log file,
//! reporting each step that had nothing to do.

use anyhow::Result;
use colored::*;

use crate::bootstrap;
use crate::config::Config;

/// Run every bootstrap step and report what happened
pub fn run_setup(config: &Config) -> Result<()> {
    let steps: [(&str, fn(&Config) -> bool); 4] = [
        ("home directory", bootstrap::create_home_dir),
        ("jobs directory", bootstrap::create_jobs_dir),
        ("config file", bootstrap::generate_config_file),
        ("log file", bootstrap::generate_log_file),
    ];

    for (label, step) in steps {
        if step(config) {
            println!("  {} {}", "Created".green(), label);
        } else {
            println!(
                "  {}",
                format!("Could not create {} or it already exists...", label).yellow()
            );
        }
    }

    if !bootstrap::check_system_setup(config) {
        anyhow::bail!("Setup did not complete in {}", config.home_dir.display());
    }

    println!("{}", "✓ Setup finished".green().bold());
    println!("  Home: {}", config.home_dir.display().to_string().dimmed());
    println!("  Jobs: {}", config.jobs_dir.display().to_string().dimmed());

    Ok(())
}
