//! Viki Engine
//!
//! Job discovery, output persistence and the job service that ties them to
//! the runner.
//!
//! - Repositories: the jobs directory (read-only) and the output store
//! - Services: `JobService`, the single entry point used by the CLI

pub mod repository;
pub mod service;

pub use repository::{DirectoryJobRegistry, FileOutputStore, JobRegistry, OutputStore};
pub use service::JobService;
