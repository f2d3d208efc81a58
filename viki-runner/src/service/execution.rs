//! Execution service
//!
//! Handles job execution including:
//! - Spawning the job file directly with its arguments as discrete argv entries
//! - Capturing stdout and stderr separately
//! - Enforcing the optional timeout
//! - Turning spawn failures, exit codes and signals into a run record

use async_trait::async_trait;
use chrono::Utc;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};
use uuid::Uuid;
use viki_core::domain::job::JobDefinition;
use viki_core::domain::run::{EXIT_CODE_TIMED_OUT, RunRecord, RunStatus};

use crate::capture::OutputCapture;
use crate::config::RunnerConfig;

/// How long to keep reading output once the job process is gone
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Service trait for executing jobs
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Executes a job and waits for it to finish
    ///
    /// # Arguments
    /// * `definition` - The resolved job to run
    /// * `args` - Arguments passed to the job verbatim, in order
    ///
    /// # Returns
    /// A run record. Failing to start is reported inside the record.
    async fn execute(&self, definition: &JobDefinition, args: &[String]) -> RunRecord;
}

/// Runs job files as child processes
pub struct ProcessJobRunner {
    config: RunnerConfig,
}

/// How the wait on the child ended
enum Completion {
    Exited(ExitStatus),
    TimedOut,
    WaitFailed(std::io::Error),
}

impl ProcessJobRunner {
    /// Creates a new process runner
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn build_command(definition: &JobDefinition, args: &[String]) -> Command {
        let mut cmd = Command::new(&definition.executable_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = definition.working_dir() {
            cmd.current_dir(dir);
        }

        cmd
    }

    async fn wait_for(&self, child: &mut tokio::process::Child) -> Completion {
        let Some(limit) = self.config.job_timeout else {
            return match child.wait().await {
                Ok(status) => Completion::Exited(status),
                Err(e) => Completion::WaitFailed(e),
            };
        };

        match tokio::time::timeout(limit, child.wait()).await {
            Ok(Ok(status)) => Completion::Exited(status),
            Ok(Err(e)) => Completion::WaitFailed(e),
            Err(_elapsed) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out job process: {}", e);
                }
                Completion::TimedOut
            }
        }
    }
}

#[async_trait]
impl JobRunner for ProcessJobRunner {
    async fn execute(&self, definition: &JobDefinition, args: &[String]) -> RunRecord {
        let started_at = Utc::now();
        let arguments = args.to_vec();

        info!(
            job = %definition.name,
            path = %definition.executable_path.display(),
            args = args.len(),
            "Starting job"
        );

        let mut child = match Self::build_command(definition, args).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(job = %definition.name, error = %e, "Job could not start");
                return RunRecord::could_not_start(&definition.name, arguments, started_at, e);
            }
        };

        let limit = self.config.max_output_bytes;
        let stdout = OutputCapture::spawn(child.stdout.take(), limit);
        let stderr = OutputCapture::spawn(child.stderr.take(), limit);

        let completion = self.wait_for(&mut child).await;

        let stdout = stdout.finish(OUTPUT_DRAIN_GRACE).await;
        let stderr = stderr.finish(OUTPUT_DRAIN_GRACE).await;
        let ended_at = Utc::now();

        let truncated = stdout.is_truncated() || stderr.is_truncated();
        if truncated {
            warn!(
                job = %definition.name,
                stdout_dropped = stdout.dropped_bytes,
                stderr_dropped = stderr.dropped_bytes,
                limit,
                "Job output exceeded the capture limit"
            );
        }

        let stdout = stdout.text;
        let mut stderr = stderr.text;

        let (exit_code, timed_out) = match completion {
            Completion::Exited(status) => (exit_code_of(status), false),
            Completion::TimedOut => {
                warn!(
                    job = %definition.name,
                    timeout = ?self.config.job_timeout,
                    "Job timed out and was killed"
                );
                (EXIT_CODE_TIMED_OUT, true)
            }
            Completion::WaitFailed(e) => {
                error!(job = %definition.name, error = %e, "Failed to wait for job process");
                stderr.push_str(&format!("failed to wait for job process: {}\n", e));
                (1, false)
            }
        };

        let status = if exit_code == 0 && !timed_out {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        info!(
            job = %definition.name,
            status = %status,
            exit_code,
            "Job finished"
        );

        RunRecord {
            id: Uuid::new_v4(),
            job_name: definition.name.clone(),
            arguments,
            started_at,
            ended_at,
            exit_code,
            stdout,
            stderr,
            status,
            timed_out,
            truncated,
        }
    }
}

/// Maps an exit status to a single integer
///
/// Processes killed by a signal report `128 + signal`, as shells do.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
