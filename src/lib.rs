//! Registry Cleanup Library
//!
//! Deletes old container image tags from the hub API or any Registry v2 server while always
//! keeping the most recent ones.

pub mod cleanup;
pub mod cli;
pub mod error;
pub mod logging;
pub mod model;
pub mod registry;
pub mod rest;
pub mod retention;

pub use cleanup::{Cleanup, CleanupPlan};
pub use cli::{CleanupOptions, RetentionConfig};
pub use error::{CleanupError, Result};
pub use logging::Logger;
pub use model::{CleanupReport, TagCandidate};
