//! Job domain types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest job name accepted, in bytes.
pub const MAX_JOB_NAME_LEN: usize = 128;

/// A resolved, runnable job
///
/// Built fresh by the registry on every scan and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Lookup key, derived from the job file name
    pub name: String,
    /// Absolute path of the job file inside the jobs directory
    pub executable_path: PathBuf,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, executable_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            executable_path: executable_path.into(),
        }
    }

    /// Directory the job file lives in, used as the job's working directory
    pub fn working_dir(&self) -> Option<&Path> {
        self.executable_path.parent()
    }
}

/// Checks a job name against the naming rule
///
/// A valid name is non-empty, starts with an ASCII letter or digit and
/// otherwise only contains ASCII letters, digits, `-`, `_` or `.`. Names
/// containing `..` are rejected so a name can never climb out of a directory.
pub fn is_valid_job_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_JOB_NAME_LEN || name.contains("..") {
        return false;
    }

    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());

    first_ok && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Derives a job name from a file name in the jobs directory
///
/// The name is the file name minus its final extension (`backup.sh` becomes
/// `backup`). Returns `None` for hidden files, non UTF-8 names and names that
/// fail [`is_valid_job_name`].
pub fn job_name_from_file_name(file_name: &str) -> Option<String> {
    if file_name.starts_with('.') {
        return None;
    }

    let name = match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name,
    };

    is_valid_job_name(name).then(|| name.to_string())
}
