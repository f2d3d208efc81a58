//! Viki Runner
//!
//! Executes job definitions as child processes and turns whatever happens
//! into a run record.
//!
//! Architecture:
//! - Configuration: timeout and output capture limits
//! - Capture: bounded readers for the child's stdout and stderr
//! - Services: the `JobRunner` trait and its process-backed implementation
//!
//! Spawn failures, nonzero exits and timeouts are all data here. The runner
//! never returns an error for something the job itself did.

pub mod capture;
pub mod config;
pub mod service;

pub use config::RunnerConfig;
pub use service::{JobRunner, ProcessJobRunner};
