//! Job Service
//!
//! The single entry point used by the CLI. Resolves jobs through the
//! registry, runs them and hands every record to the output store.

use std::sync::Arc;
use viki_core::Result;
use viki_core::domain::run::{RunRecord, RunSummary};
use viki_runner::JobRunner;

use crate::repository::{JobRegistry, OutputStore};

/// Composes the registry, runner and output store
///
/// Holds no state of its own; construct one per invocation.
pub struct JobService {
    registry: Arc<dyn JobRegistry>,
    runner: Arc<dyn JobRunner>,
    store: Arc<dyn OutputStore>,
}

impl JobService {
    pub fn new(
        registry: Arc<dyn JobRegistry>,
        runner: Arc<dyn JobRunner>,
        store: Arc<dyn OutputStore>,
    ) -> Self {
        Self {
            registry,
            runner,
            store,
        }
    }

    /// List the names of all registered jobs
    pub async fn list_jobs(&self) -> Result<Vec<String>> {
        self.registry.list().await
    }

    /// Run a job and persist its record
    ///
    /// A job that fails or never starts still yields `Ok`; only a missing
    /// job or a persistence failure is an error.
    pub async fn run_job(&self, name: &str, args: &[String]) -> Result<RunSummary> {
        let definition = self.registry.resolve(name).await?;

        let record = self.runner.execute(&definition, args).await;

        if let Err(e) = self.store.persist(&record).await {
            tracing::error!("Run of '{}' finished but could not be saved: {}", name, e);
            return Err(e);
        }

        tracing::info!(
            "Job '{}' finished with status {} (exit code {})",
            name,
            record.status,
            record.exit_code
        );

        Ok(RunSummary::from(&record))
    }

    /// Get the latest run record of a job
    ///
    /// The job must still be registered; the record's `output()` is the
    /// captured text.
    pub async fn get_last_output(&self, name: &str) -> Result<RunRecord> {
        self.registry.resolve(name).await?;
        self.store.query_last(name).await
    }

    /// Get up to `limit` past runs of a job, newest first
    pub async fn get_history(&self, name: &str, limit: usize) -> Result<Vec<RunRecord>> {
        self.registry.resolve(name).await?;
        self.store.query_history(name, limit).await
    }
}
