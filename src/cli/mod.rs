//! Command line interface module
//!
//! Argument and environment parsing, configuration validation and the runner that ties
//! them to a cleanup run.

pub mod args;
pub mod config;
pub mod runner;

pub use args::Args;
pub use config::{CleanupOptions, RetentionConfig};
pub use runner::Runner;
