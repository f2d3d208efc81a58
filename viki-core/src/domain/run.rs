//! Run record domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exit code recorded when the job process could not be spawned.
///
/// Real process exit codes are never negative, so this cannot collide.
pub const EXIT_CODE_NOT_STARTED: i32 = -1;

/// Exit code recorded when a job is killed for exceeding its timeout.
pub const EXIT_CODE_TIMED_OUT: i32 = 124; // Standard timeout exit code

/// Outcome of a single job execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Process exited with code 0
    Succeeded,

    /// Process exited nonzero, was killed by a signal, or timed out
    Failed,

    /// Process never started (missing binary, permission denied, ...)
    CouldNotStart,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "Succeeded"),
            RunStatus::Failed => write!(f, "Failed"),
            RunStatus::CouldNotStart => write!(f, "CouldNotStart"),
        }
    }
}

/// Immutable record of one execution attempt
///
/// Produced by the runner, persisted by the output store. Standard output and
/// standard error are kept apart and joined by [`RunRecord::output`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub job_name: String,
    pub arguments: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub status: RunStatus,
    #[serde(default)]
    pub timed_out: bool,

    /// Some output was discarded past the capture limit
    #[serde(default)]
    pub truncated: bool,
}

impl RunRecord {
    /// Builds the record for a job whose process could not be spawned
    ///
    /// The spawn error takes the place of standard output so that a later
    /// `output` lookup explains why the job never ran.
    pub fn could_not_start(
        job_name: impl Into<String>,
        arguments: Vec<String>,
        started_at: DateTime<Utc>,
        error: impl std::fmt::Display,
    ) -> Self {
        let job_name = job_name.into();
        let stdout = format!("could not start job '{}': {}", job_name, error);

        Self {
            id: Uuid::new_v4(),
            job_name,
            arguments,
            started_at,
            ended_at: Utc::now(),
            exit_code: EXIT_CODE_NOT_STARTED,
            stdout,
            stderr: String::new(),
            status: RunStatus::CouldNotStart,
            timed_out: false,
            truncated: false,
        }
    }

    /// Combined textual result: standard output followed by standard error
    pub fn output(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.ended_at.signed_duration_since(self.started_at)
    }
}

/// Caller-facing summary of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_name: String,
    pub status: RunStatus,
    pub exit_code: i32,
    pub output: String,
    pub duration_ms: i64,
    pub timed_out: bool,
    pub truncated: bool,
}

impl From<&RunRecord> for RunSummary {
    fn from(record: &RunRecord) -> Self {
        Self {
            job_name: record.job_name.clone(),
            status: record.status,
            exit_code: record.exit_code,
            output: record.output(),
            duration_ms: record.duration().num_milliseconds(),
            timed_out: record.timed_out,
            truncated: record.truncated,
        }
    }
}
