//! Service layer
//!
//! Services contain business logic for the runner. The execution service
//! is trait-based so the engine can be tested with a scripted runner.

mod execution;

// Re-export traits
pub use execution::JobRunner;

// Re-export implementations
pub use execution::ProcessJobRunner;
