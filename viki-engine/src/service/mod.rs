//! Service Module
//!
//! Business logic layer for the engine.
//! Services orchestrate between repositories and the runner.

pub mod job;

pub use job::JobService;
