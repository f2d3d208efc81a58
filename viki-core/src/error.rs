//! Error types for Viki

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for registry, runner and store operations
pub type Result<T> = std::result::Result<T, VikiError>;

/// Errors surfaced by the Viki engine
///
/// A job that fails to start is not an error: it is recorded as
/// `RunStatus::CouldNotStart` inside a run record.
#[derive(Debug, Error)]
pub enum VikiError {
    /// No job with this name exists in the jobs directory
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// The job exists but has never been run
    #[error("No output yet for job '{0}'")]
    NoOutputYet(String),

    /// Name rejected by the job naming rule
    #[error("Invalid job name: {0:?}")]
    InvalidJobName(String),

    /// Two files in the jobs directory map to the same job name
    #[error("Duplicate job '{name}': {} and {}", .first.display(), .second.display())]
    DuplicateJob {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Jobs directory could not be read
    #[error("Failed to read jobs directory {}: {source}", .path.display())]
    Registry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output store could not read or write a record
    #[error("Output store I/O error at {}: {source}", .path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be encoded or decoded
    #[error("Output store record at {} is malformed: {source}", .path.display())]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl VikiError {
    pub fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StoreIo {
            path: path.into(),
            source,
        }
    }

    pub fn store_format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::StoreFormat {
            path: path.into(),
            source,
        }
    }

    /// Check if this error means the job name did not resolve
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound(_))
    }

    /// Check if this error is a persistence failure
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::StoreIo { .. } | Self::StoreFormat { .. })
    }
}
