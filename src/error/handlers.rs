//! Standardized mapping of REST failures onto the cleanup error taxonomy

use crate::error::CleanupError;
use crate::rest::RestError;
use reqwest::StatusCode;

/// Standard error handler for HTTP responses
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Describe a failed request in the context of `operation`
    pub fn describe(err: &RestError, operation: &str) -> String {
        match err {
            RestError::Status { status, body } => {
                let detail = Self::body_excerpt(body);
                Self::describe_status(*status, &detail, operation)
            }
            other => format!("{} failed: {}", operation, other),
        }
    }

    fn describe_status(status: StatusCode, detail: &str, operation: &str) -> String {
        let msg = match status.as_u16() {
            401 => format!("Unauthorized to perform {}", operation),
            403 => format!("Forbidden: insufficient permissions for {}", operation),
            404 => format!("Resource not found for {}", operation),
            405 => format!("{} not allowed by the registry (is deletion enabled?)", operation),
            429 => format!("Rate limited during {}", operation),
            500 => format!("Registry server error during {}", operation),
            502 | 503 => format!("Registry unavailable for {}", operation),
            _ => format!("{} failed", operation),
        };

        if detail.is_empty() {
            format!("{} ({})", msg, status)
        } else {
            format!("{} ({}): {}", msg, status, detail)
        }
    }

    /// Keep error bodies readable in a single log line
    fn body_excerpt(body: &[u8]) -> String {
        const MAX: usize = 200;
        let text = String::from_utf8_lossy(body);
        let text = text.trim();
        if text.chars().count() > MAX {
            let cut: String = text.chars().take(MAX).collect();
            format!("{}...", cut)
        } else {
            text.to_string()
        }
    }

    pub fn auth_error(err: &RestError, operation: &str) -> CleanupError {
        CleanupError::Authentication(Self::describe(err, operation))
    }

    pub fn discovery_error(err: &RestError, operation: &str) -> CleanupError {
        CleanupError::Discovery(Self::describe(err, operation))
    }

    pub fn resolution_error(err: &RestError, operation: &str) -> CleanupError {
        CleanupError::Resolution(Self::describe(err, operation))
    }

    pub fn deletion_error(err: &RestError, operation: &str) -> CleanupError {
        CleanupError::Deletion(Self::describe(err, operation))
    }
}
