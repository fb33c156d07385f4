//! CLI argument parsing

pub mod args;

// Re-exports
pub use crate::logging::LogFormat;
pub use args::Args;
