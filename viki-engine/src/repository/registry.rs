//! Job Registry
//!
//! Discovers jobs by scanning the jobs directory. Every call rescans, so jobs
//! added or removed between invocations are picked up without any cache.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};
use viki_core::domain::job::{JobDefinition, is_valid_job_name, job_name_from_file_name};
use viki_core::{Result, VikiError};

/// Repository trait for job discovery
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Lists the names of all discoverable jobs, sorted by name
    async fn list(&self) -> Result<Vec<String>>;

    /// Resolves a job name to its definition
    ///
    /// Names that break the naming rule are reported as `JobNotFound`
    /// without touching the filesystem.
    async fn resolve(&self, name: &str) -> Result<JobDefinition>;
}

/// Registry backed by a directory of job files
pub struct DirectoryJobRegistry {
    jobs_dir: PathBuf,
}

impl DirectoryJobRegistry {
    /// Creates a registry for `jobs_dir`
    pub fn new(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            jobs_dir: jobs_dir.into(),
        }
    }

    fn registry_error(&self, source: std::io::Error) -> VikiError {
        VikiError::Registry {
            path: self.jobs_dir.clone(),
            source,
        }
    }

    /// Scans the jobs directory into a name -> absolute path map
    async fn scan(&self) -> Result<ScanResult> {
        let root = tokio::fs::canonicalize(&self.jobs_dir)
            .await
            .map_err(|e| self.registry_error(e))?;

        let mut entries = tokio::fs::read_dir(&root)
            .await
            .map_err(|e| self.registry_error(e))?;

        let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.registry_error(e))?
        {
            let file_type = entry.file_type().await.map_err(|e| self.registry_error(e))?;
            if file_type.is_dir() {
                continue;
            }

            // Follow links so a link to a directory is skipped. A dangling
            // link is still a job; running it reports CouldNotStart.
            if file_type.is_symlink() {
                if let Ok(meta) = tokio::fs::metadata(entry.path()).await {
                    if meta.is_dir() {
                        continue;
                    }
                }
            }

            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                debug!("Skipping non UTF-8 entry {:?}", entry.path());
                continue;
            };

            let Some(name) = job_name_from_file_name(file_name) else {
                debug!("Skipping {:?}: not a valid job file name", file_name);
                continue;
            };

            found.entry(name).or_default().push(root.join(file_name));
        }

        let mut scan = ScanResult::default();
        for (name, mut paths) in found {
            if paths.len() == 1 {
                scan.jobs.extend(paths.pop().map(|path| (name, path)));
            } else {
                paths.sort();
                warn!("{} job files map to '{}'", paths.len(), name);
                scan.collisions.insert(name, paths);
            }
        }

        debug!(
            "Found {} job(s) and {} colliding name(s) in {}",
            scan.jobs.len(),
            scan.collisions.len(),
            root.display()
        );

        Ok(scan)
    }
}

/// Result of one directory scan
#[derive(Default)]
struct ScanResult {
    /// Names backed by exactly one file
    jobs: BTreeMap<String, PathBuf>,

    /// Names claimed by two or more files, paths sorted
    collisions: BTreeMap<String, Vec<PathBuf>>,
}

#[async_trait]
impl JobRegistry for DirectoryJobRegistry {
    async fn list(&self) -> Result<Vec<String>> {
        let scan = self.scan().await?;
        for name in scan.collisions.keys() {
            warn!("Not listing '{}': more than one job file uses this name", name);
        }
        Ok(scan.jobs.into_keys().collect())
    }

    async fn resolve(&self, name: &str) -> Result<JobDefinition> {
        if !is_valid_job_name(name) {
            warn!("Rejected job name {:?}", name);
            return Err(VikiError::JobNotFound(name.to_string()));
        }

        let mut scan = self.scan().await?;

        if let Some(paths) = scan.collisions.remove(name) {
            let mut paths = paths.into_iter();
            if let (Some(first), Some(second)) = (paths.next(), paths.next()) {
                return Err(VikiError::DuplicateJob {
                    name: name.to_string(),
                    first,
                    second,
                });
            }
        }

        let path = scan
            .jobs
            .remove(name)
            .ok_or_else(|| VikiError::JobNotFound(name.to_string()))?;

        Ok(JobDefinition::new(name, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn touch(dir: &Path, file_name: &str) {
        std::fs::write(dir.join(file_name), "#!/bin/sh\n").expect("write job file");
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_complete() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "zeta.sh");
        touch(dir.path(), "alpha.py");
        touch(dir.path(), "middle");

        let registry = DirectoryJobRegistry::new(dir.path());
        let names = registry.list().await.expect("list");

        assert_eq!(names, vec!["alpha", "middle", "zeta"]);
    }

    #[tokio::test]
    async fn test_list_skips_hidden_dirs_and_invalid_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "good.sh");
        touch(dir.path(), ".hidden.sh");
        touch(dir.path(), "bad name.sh");
        std::fs::create_dir(dir.path().join("subdir")).expect("mkdir");

        let registry = DirectoryJobRegistry::new(dir.path());
        assert_eq!(registry.list().await.expect("list"), vec!["good"]);
    }

    #[tokio::test]
    async fn test_list_rescans_every_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = DirectoryJobRegistry::new(dir.path());
        assert!(registry.list().await.expect("list").is_empty());

        touch(dir.path(), "late.sh");
        assert_eq!(registry.list().await.expect("list"), vec!["late"]);

        std::fs::remove_file(dir.path().join("late.sh")).expect("rm");
        assert!(registry.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_resolve_returns_absolute_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "backup.sh");

        let registry = DirectoryJobRegistry::new(dir.path());
        let def = registry.resolve("backup").await.expect("resolve");

        let expected = dir.path().canonicalize().expect("canonicalize").join("backup.sh");
        assert_eq!(def.name, "backup");
        assert_eq!(def.executable_path, expected);
        assert!(def.executable_path.is_absolute());
    }

    #[tokio::test]
    async fn test_resolve_unknown_job() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = DirectoryJobRegistry::new(dir.path());

        let err = registry.resolve("missing").await.unwrap_err();
        assert!(matches!(err, VikiError::JobNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let parent = tempfile::tempdir().expect("tempdir");
        let jobs = parent.path().join("jobs");
        std::fs::create_dir(&jobs).expect("mkdir");
        touch(parent.path(), "outside.sh");

        let registry = DirectoryJobRegistry::new(&jobs);
        for name in ["../outside", "..", "/bin/sh", "a/b", "outside/../outside"] {
            let err = registry.resolve(name).await.unwrap_err();
            assert!(err.is_not_found(), "{name:?} should not resolve, got {err:?}");
        }
    }

    #[tokio::test]
    async fn test_duplicate_names_are_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "build.sh");
        touch(dir.path(), "build.py");

        let registry = DirectoryJobRegistry::new(dir.path());
        let err = registry.resolve("build").await.unwrap_err();

        match err {
            VikiError::DuplicateJob { name, first, second } => {
                assert_eq!(name, "build");
                assert!(first.ends_with("build.py"));
                assert!(second.ends_with("build.sh"));
            }
            other => panic!("expected DuplicateJob, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collision_does_not_affect_other_jobs() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "notes.md");
        touch(dir.path(), "hello.sh");

        let registry = DirectoryJobRegistry::new(dir.path());

        assert_eq!(registry.list().await.expect("list"), vec!["hello"]);

        let def = registry.resolve("hello").await.expect("resolve");
        assert!(def.executable_path.ends_with("hello.sh"));

        let err = registry.resolve("missing").await.unwrap_err();
        assert!(matches!(err, VikiError::JobNotFound(name) if name == "missing"));

        let err = registry.resolve("notes").await.unwrap_err();
        assert!(matches!(err, VikiError::DuplicateJob { .. }));
    }

    #[tokio::test]
    async fn test_missing_jobs_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = DirectoryJobRegistry::new(dir.path().join("nope"));

        let err = registry.list().await.unwrap_err();
        assert!(matches!(err, VikiError::Registry { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target_dir = tempfile::tempdir().expect("tempdir");
        touch(target_dir.path(), "real.sh");

        std::os::unix::fs::symlink(target_dir.path().join("real.sh"), dir.path().join("linked.sh"))
            .expect("symlink file");
        std::os::unix::fs::symlink(target_dir.path(), dir.path().join("folder"))
            .expect("symlink dir");
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling.sh"))
            .expect("symlink dangling");

        let registry = DirectoryJobRegistry::new(dir.path());
        assert_eq!(registry.list().await.expect("list"), vec!["dangling", "linked"]);
    }
}
