//! Error types for registry cleanup runs
//!
//! Fatal variants abort a run and surface as the process error. `Resolution` and `Deletion`
//! are per-tag failures: they are logged and counted where they occur and never escape the
//! task that produced them.

pub mod handlers;

use crate::rest::RestError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CleanupError>;

#[derive(Debug, Error)]
pub enum CleanupError {
    /// Missing or invalid configuration, detected before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The target does not answer the Registry v2 capability probe
    #[error("Registry does not support the v2 API: {0}")]
    ProtocolUnsupported(String),
    /// Login, token fetch or challenge decoding failed
    #[error("Authentication error: {0}")]
    Authentication(String),
    /// Tag listing failed; partial listings are never acted upon
    #[error("Discovery error: {0}")]
    Discovery(String),
    /// A single tag's manifest or timestamp could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(String),
    /// A single tag could not be deleted
    #[error("Deletion error: {0}")]
    Deletion(String),
    #[error(transparent)]
    Rest(#[from] RestError),
}

impl CleanupError {
    /// Whether the run must stop when this error is raised
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CleanupError::Resolution(_) | CleanupError::Deletion(_))
    }
}

impl From<regex::Error> for CleanupError {
    fn from(err: regex::Error) -> Self {
        CleanupError::Configuration(format!("invalid tag regex: {}", err))
    }
}
