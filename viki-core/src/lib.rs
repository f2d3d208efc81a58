//! Viki Core
//!
//! Core types and abstractions for the Viki automation framework.
//!
//! This crate contains:
//! - Domain types: Job definitions, run records and summaries
//! - Error taxonomy shared by the registry, runner and output store

pub mod domain;
pub mod error;

pub use error::{Result, VikiError};
