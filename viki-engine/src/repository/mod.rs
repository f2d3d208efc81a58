//! Repository Module
//!
//! Data access layer for the engine. The registry reads job definitions
//! from the jobs directory; the output store owns the on-disk run records.
//!
//! All repositories are trait-based to enable testing and mocking.

mod output;
mod registry;

// Re-export traits
pub use output::OutputStore;
pub use registry::JobRegistry;

// Re-export implementations
pub use output::FileOutputStore;
pub use registry::DirectoryJobRegistry;
