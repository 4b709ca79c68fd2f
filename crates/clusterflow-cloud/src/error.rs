//! Cloud provider error types

use std::time::Duration;
use thiserror::Error;

/// Cloud provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Import id {0:?} is not service_name/cluster_id/id formatted")]
    InvalidImportId(String),

    #[error(
        "Remote operation failed for {target}: {reason} (last status: {})",
        .last_status.as_deref().unwrap_or("none")
    )]
    RemoteFailure {
        target: String,
        reason: String,
        last_status: Option<String>,
    },

    #[error(
        "Timeout after {elapsed:?} waiting for {target} (last status: {})",
        .last_status.as_deref().unwrap_or("none")
    )]
    Timeout {
        target: String,
        elapsed: Duration,
        last_status: Option<String>,
    },

    #[error("Fetching status of {target} failed after {attempts} attempt(s): {source}")]
    FetchFailed {
        target: String,
        attempts: u32,
        last_status: Option<String>,
        source: Box<CloudError>,
    },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether retrying the same request may succeed.
    ///
    /// Transport failures, request timeouts, throttling and server-side
    /// errors are transient. Everything else is final.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Transport(_) => true,
            CloudError::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the error means the remote resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CloudError::ResourceNotFound(_) | CloudError::Api { status: 404, .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> CloudError {
        CloudError::Api {
            status,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(CloudError::Transport("connection reset".to_string()).is_transient());
        assert!(api(500).is_transient());
        assert!(api(503).is_transient());
        assert!(api(429).is_transient());
        assert!(api(408).is_transient());

        assert!(!api(400).is_transient());
        assert!(!api(403).is_transient());
        assert!(!api(404).is_transient());
        assert!(!CloudError::InvalidConfig("x".to_string()).is_transient());
    }

    #[test]
    fn test_not_found_classification() {
        assert!(api(404).is_not_found());
        assert!(CloudError::ResourceNotFound("user".to_string()).is_not_found());
        assert!(!api(500).is_not_found());
        assert!(!CloudError::Transport("x".to_string()).is_not_found());
    }

    #[test]
    fn test_wait_errors_carry_last_status() {
        let err = CloudError::RemoteFailure {
            target: "opensearch user u1".to_string(),
            reason: "reached failure status".to_string(),
            last_status: Some("ERROR".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("opensearch user u1"));
        assert!(message.contains("last status: ERROR"));

        let err = CloudError::Timeout {
            target: "opensearch user u1".to_string(),
            elapsed: Duration::from_secs(5),
            last_status: None,
        };
        assert!(err.to_string().contains("last status: none"));
    }
}
