//! Job command handlers
//!
//! Handles listing, running and inspecting jobs through the job service.

use anyhow::{Context, Result};
use colored::*;
use std::sync::Arc;
use viki_core::VikiError;
use viki_core::domain::run::{RunRecord, RunStatus, RunSummary};
use viki_engine::{DirectoryJobRegistry, FileOutputStore, JobService};
use viki_runner::ProcessJobRunner;

use crate::config::Config;

/// Builds the job service for this invocation
fn build_service(config: &Config) -> Result<JobService> {
    let runner_config = config.runner_config();
    runner_config
        .validate()
        .context("Invalid runner configuration")?;

    Ok(JobService::new(
        Arc::new(DirectoryJobRegistry::new(&config.jobs_dir)),
        Arc::new(ProcessJobRunner::new(runner_config)),
        Arc::new(FileOutputStore::new(
            &config.output_dir,
            config.retain_history,
        )),
    ))
}

/// List all jobs
pub async fn list_jobs(config: &Config) -> Result<()> {
    let service = build_service(config)?;
    let jobs = service.list_jobs().await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        println!(
            "  Add executable files to {}",
            config.jobs_dir.display().to_string().dimmed()
        );
    } else {
        for job in jobs {
            println!("{}", job);
        }
    }

    Ok(())
}

/// Run a job and print its summary
pub async fn run_job(config: &Config, job_name: &str, args: Vec<String>) -> Result<()> {
    let service = build_service(config)?;
    let summary = service
        .run_job(job_name, &args)
        .await
        .with_context(|| format!("Failed to run job '{}'", job_name))?;

    print_run_summary(&summary);

    Ok(())
}

/// Show the output of the last run of a job
pub async fn show_output(config: &Config, job_name: &str) -> Result<()> {
    let service = build_service(config)?;

    match service.get_last_output(job_name).await {
        Ok(record) => {
            print_record_header(&record);
            let output = record.output();
            print!("{}", output);
            if !output.is_empty() && !output.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        Err(VikiError::NoOutputYet(name)) => {
            println!(
                "{}",
                format!("No output yet for job '{}'. Run it with `viki run {}`.", name, name)
                    .yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Show recent runs of a job
pub async fn show_history(config: &Config, job_name: &str, limit: usize) -> Result<()> {
    let service = build_service(config)?;
    let records = service.get_history(job_name, limit).await?;

    if records.is_empty() {
        println!("{}", format!("No history for job '{}'.", job_name).yellow());
        if !config.retain_history {
            println!(
                "  Set {} in {} to keep past runs.",
                "\"retain_history\": true".cyan(),
                config.config_file.display()
            );
        }
        return Ok(());
    }

    println!(
        "{}",
        format!("Last {} run(s) of {}:", records.len(), job_name).bold()
    );
    println!();
    for record in &records {
        print_history_line(record);
    }

    Ok(())
}

/// Create a job (no-op)
pub fn create_job(job_name: &str) -> Result<()> {
    println!(
        "{}",
        format!("-- Creating '{}' is not yet implemented --", job_name).yellow()
    );
    Ok(())
}

/// Print the result of a run
fn print_run_summary(summary: &RunSummary) {
    println!("  {} Job {}", "▸".cyan(), summary.job_name.bold());
    println!("    Status:    {}", colorize_status(summary.status));
    println!("    Exit Code: {}", summary.exit_code);
    println!(
        "    Duration:  {}",
        format_duration_ms(summary.duration_ms).dimmed()
    );
    if summary.timed_out {
        println!("    {}", "Killed after exceeding the job timeout".red());
    }
    if summary.truncated {
        println!("    {}", TRUNCATED_NOTE.yellow());
    }

    if !summary.output.is_empty() {
        println!("\n{}", "Output:".bold());
        println!("{}", "─".repeat(80).dimmed());
        print!("{}", summary.output);
        if !summary.output.ends_with('\n') {
            println!();
        }
        println!("{}", "─".repeat(80).dimmed());
    }
}

const TRUNCATED_NOTE: &str = "Output truncated at the capture limit (max_output_bytes)";

/// Print the one-line header shown above stored output
fn print_record_header(record: &RunRecord) {
    println!("{}", record_header(record).dimmed());
}

fn record_header(record: &RunRecord) -> String {
    let mut header = format!(
        "Last run of {} at {}: {} (exit code {})",
        record.job_name,
        record.started_at.format("%Y-%m-%d %H:%M:%S"),
        record.status,
        record.exit_code
    );
    if record.timed_out {
        header.push_str(", timed out");
    }
    if record.truncated {
        header.push_str(", output truncated");
    }
    header
}

/// Print a single history entry
fn print_history_line(record: &RunRecord) {
    let args = if record.arguments.is_empty() {
        String::new()
    } else {
        format!("  args: {:?}", record.arguments)
    };

    println!(
        "  {}  {:<13}  exit {:>4}  {:>8}{}",
        record
            .started_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed(),
        colorize_status(record.status),
        record.exit_code,
        format_duration_ms(record.duration().num_milliseconds()),
        args.dimmed()
    );
}

/// Colorize run status for display
fn colorize_status(status: RunStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        RunStatus::Succeeded => status_str.green(),
        RunStatus::Failed => status_str.red(),
        RunStatus::CouldNotStart => status_str.yellow(),
    }
}

fn format_duration_ms(ms: i64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.2}s", ms as f64 / 1000.0)
    }
}
