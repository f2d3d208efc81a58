//! Core domain types
//!
//! This module contains the core domain structures used across Viki crates.
//! Definitions are produced by the registry, records by the runner, and the
//! output store persists records without ever handing out mutable access.

pub mod job;
pub mod run;
