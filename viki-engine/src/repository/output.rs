//! Output Store
//!
//! Persists run records under the output directory:
//!
//! ```text
//! <output_dir>/<job_name>/last.json
//! <output_dir>/<job_name>/history/<started_at nanos>-<record id>.json
//! ```
//!
//! Every file is written to a uniquely named temp file in the same directory,
//! synced, and renamed into place, and the directory is synced after the
//! rename. Readers therefore see either the previous record or the new one,
//! never a partial write. Concurrent writers for the
//! same job each rename their own temp file, so the last rename to complete
//! wins.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use uuid::Uuid;
use viki_core::domain::job::is_valid_job_name;
use viki_core::domain::run::RunRecord;
use viki_core::{Result, VikiError};

const LATEST_FILE: &str = "last.json";
const HISTORY_DIR: &str = "history";

/// Repository trait for run record persistence
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Stores `record` as the latest run of its job
    async fn persist(&self, record: &RunRecord) -> Result<()>;

    /// Returns the latest run of `job_name`, or `NoOutputYet`
    async fn query_last(&self, job_name: &str) -> Result<RunRecord>;

    /// Returns up to `limit` past runs of `job_name`, newest first
    ///
    /// Empty when history retention is disabled or the job never ran.
    async fn query_history(&self, job_name: &str, limit: usize) -> Result<Vec<RunRecord>>;
}

/// Output store backed by JSON files
pub struct FileOutputStore {
    root: PathBuf,
    retain_history: bool,
}

impl FileOutputStore {
    /// Creates a store rooted at `root`
    ///
    /// # Arguments
    /// * `root` - Output directory, created on first write
    /// * `retain_history` - Also keep every record, not only the latest
    pub fn new(root: impl Into<PathBuf>, retain_history: bool) -> Self {
        Self {
            root: root.into(),
            retain_history,
        }
    }

    fn job_dir(&self, job_name: &str) -> Result<PathBuf> {
        if !is_valid_job_name(job_name) {
            return Err(VikiError::InvalidJobName(job_name.to_string()));
        }
        Ok(self.root.join(job_name))
    }

    async fn read_record(path: &Path) -> Result<RunRecord> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| VikiError::store_io(path, e))?;

        serde_json::from_slice(&bytes).map_err(|e| VikiError::store_format(path, e))
    }
}

#[async_trait]
impl OutputStore for FileOutputStore {
    async fn persist(&self, record: &RunRecord) -> Result<()> {
        let job_dir = self.job_dir(&record.job_name)?;
        let latest = job_dir.join(LATEST_FILE);

        let bytes =
            serde_json::to_vec_pretty(record).map_err(|e| VikiError::store_format(&latest, e))?;

        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| VikiError::store_io(&job_dir, e))?;

        if self.retain_history {
            let history_dir = job_dir.join(HISTORY_DIR);
            tokio::fs::create_dir_all(&history_dir)
                .await
                .map_err(|e| VikiError::store_io(&history_dir, e))?;

            let entry = history_dir.join(history_file_name(record));
            write_atomic(&entry, &bytes).await?;
        }

        write_atomic(&latest, &bytes).await?;

        info!(
            job = %record.job_name,
            record = %record.id,
            "Persisted run record to {}",
            latest.display()
        );

        Ok(())
    }

    async fn query_last(&self, job_name: &str) -> Result<RunRecord> {
        let latest = self.job_dir(job_name)?.join(LATEST_FILE);

        match Self::read_record(&latest).await {
            Err(VikiError::StoreIo { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Err(VikiError::NoOutputYet(job_name.to_string()))
            }
            other => other,
        }
    }

    async fn query_history(&self, job_name: &str, limit: usize) -> Result<Vec<RunRecord>> {
        let history_dir = self.job_dir(job_name)?.join(HISTORY_DIR);

        let mut entries = match tokio::fs::read_dir(&history_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VikiError::store_io(&history_dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VikiError::store_io(&history_dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // skip temp files left by an interrupted write
            if name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            files.push(name.to_string());
        }

        // names start with a zero-padded timestamp, so reverse order is newest first
        files.sort_unstable_by(|a, b| b.cmp(a));
        files.truncate(limit);

        let mut records = Vec::with_capacity(files.len());
        for name in files {
            records.push(Self::read_record(&history_dir.join(name)).await?);
        }

        debug!("Loaded {} history record(s) for {}", records.len(), job_name);

        Ok(records)
    }
}

/// History entries sort newest last by name: zero-padded nanosecond start
/// time, then the record id
fn history_file_name(record: &RunRecord) -> String {
    let nanos = record
        .started_at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| record.started_at.timestamp_millis().saturating_mul(1_000_000));

    format!("{:020}-{}.json", nanos.max(0), record.id)
}

/// Writes `bytes` to `target` via a synced temp file and a rename
async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    let tmp = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    if let Err(e) = write_and_sync(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        error!("Failed to write {}: {}", tmp.display(), e);
        return Err(VikiError::store_io(&tmp, e));
    }

    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        error!("Failed to move {} into place: {}", tmp.display(), e);
        return Err(VikiError::store_io(target, e));
    }

    if let Err(e) = sync_dir(dir).await {
        error!("Failed to sync {}: {}", dir.display(), e);
        return Err(VikiError::store_io(dir, e));
    }

    Ok(())
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Makes a completed rename durable
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

// Directories cannot be opened as files here; the rename is all we get.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use viki_core::domain::run::RunStatus;

    fn record(job_name: &str, stdout: &str, offset_ms: i64) -> RunRecord {
        let started_at = Utc::now() + Duration::milliseconds(offset_ms);
        RunRecord {
            id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            arguments: vec!["--fast".to_string()],
            started_at,
            ended_at: started_at + Duration::milliseconds(5),
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
            status: RunStatus::Succeeded,
            timed_out: false,
            truncated: false,
        }
    }

    #[tokio::test]
    async fn test_query_before_any_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), false);

        let err = store.query_last("backup").await.unwrap_err();
        assert!(matches!(err, VikiError::NoOutputYet(name) if name == "backup"));
    }

    #[tokio::test]
    async fn test_persist_then_query() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path().join("output"), false);
        let rec = record("backup", "done\n", 0);

        store.persist(&rec).await.expect("persist");
        let loaded = store.query_last("backup").await.expect("query");

        assert_eq!(loaded, rec);
        assert!(dir.path().join("output/backup/last.json").is_file());
    }

    #[tokio::test]
    async fn test_latest_replaces_previous() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), false);

        store.persist(&record("backup", "first\n", 0)).await.expect("persist");
        store.persist(&record("backup", "second\n", 10)).await.expect("persist");

        let loaded = store.query_last("backup").await.expect("query");
        assert_eq!(loaded.stdout, "second\n");
    }

    #[tokio::test]
    async fn test_jobs_are_kept_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), false);

        store.persist(&record("alpha", "a\n", 0)).await.expect("persist");
        store.persist(&record("beta", "b\n", 0)).await.expect("persist");

        assert_eq!(store.query_last("alpha").await.expect("alpha").stdout, "a\n");
        assert_eq!(store.query_last("beta").await.expect("beta").stdout, "b\n");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), true);
        store.persist(&record("backup", "x", 0)).await.expect("persist");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("backup"))
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = std::sync::Arc::new(FileOutputStore::new(dir.path(), false));

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let rec = record("shared", &format!("writer {i}\n").repeat(200), i);
                store.persist(&rec).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("persist");
        }

        let loaded = store.query_last("shared").await.expect("query");
        assert!(loaded.stdout.starts_with("writer "));
        assert_eq!(loaded.stdout.lines().count(), 200);
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), true);

        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            store
                .persist(&record("backup", text, i as i64 * 1000))
                .await
                .expect("persist");
        }

        let all = store.query_history("backup", 10).await.expect("history");
        let texts: Vec<_> = all.iter().map(|r| r.stdout.as_str()).collect();
        assert_eq!(texts, vec!["three", "two", "one"]);

        let limited = store.query_history("backup", 2).await.expect("history");
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].stdout, "three");
    }

    #[tokio::test]
    async fn test_history_orders_runs_within_one_millisecond() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), true);

        let base = chrono::DateTime::from_timestamp(1_700_000_000, 100_000).expect("timestamp");
        let mut older = record("backup", "older", 0);
        older.started_at = base;
        let mut newer = record("backup", "newer", 0);
        newer.started_at = base + Duration::microseconds(200);
        assert_eq!(older.started_at.timestamp_millis(), newer.started_at.timestamp_millis());

        // persist out of order so only the file names decide
        store.persist(&newer).await.expect("persist newer");
        store.persist(&older).await.expect("persist older");

        for _ in 0..5 {
            let history = store.query_history("backup", 10).await.expect("history");
            let texts: Vec<_> = history.iter().map(|r| r.stdout.as_str()).collect();
            assert_eq!(texts, vec!["newer", "older"]);
        }
    }

    #[tokio::test]
    async fn test_truncated_flag_survives_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), false);
        let mut big = record("backup", "abcd", 0);
        big.truncated = true;

        store.persist(&big).await.expect("persist");

        assert!(store.query_last("backup").await.expect("load").truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        sync_dir(dir.path()).await.expect("sync existing dir");
        assert!(sync_dir(&dir.path().join("missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_history_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), false);
        store.persist(&record("backup", "x", 0)).await.expect("persist");

        assert!(store.query_history("backup", 10).await.expect("history").is_empty());
        assert!(!dir.path().join("backup/history").exists());
    }

    #[tokio::test]
    async fn test_invalid_job_name_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileOutputStore::new(dir.path(), false);

        let err = store.query_last("../escape").await.unwrap_err();
        assert!(matches!(err, VikiError::InvalidJobName(_)));

        let err = store.persist(&record("../escape", "x", 0)).await.unwrap_err();
        assert!(matches!(err, VikiError::InvalidJobName(_)));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("backup")).expect("mkdir");
        std::fs::write(dir.path().join("backup/last.json"), "{ not json").expect("write");

        let store = FileOutputStore::new(dir.path(), false);
        let err = store.query_last("backup").await.unwrap_err();
        assert!(matches!(err, VikiError::StoreFormat { .. }));
        assert!(err.is_store_error());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unwritable_root_is_a_store_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        // a regular file where the output directory should be
        let blocker = dir.path().join("output");
        std::fs::write(&blocker, "").expect("write");

        let store = FileOutputStore::new(&blocker, false);
        let err = store.persist(&record("backup", "x", 0)).await.unwrap_err();
        assert!(matches!(err, VikiError::StoreIo { .. }));
    }
}
