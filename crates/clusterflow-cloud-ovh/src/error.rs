//! OVHcloud provider error types

use clusterflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OvhError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("calling {method} {path}: OVH API returned {status}: {message}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}

impl OvhError {
    /// Whether the API reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        match self {
            OvhError::Api { status, .. } => *status == 404,
            OvhError::Cloud(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<OvhError> for CloudError {
    fn from(err: OvhError) -> Self {
        match err {
            OvhError::Api {
                method,
                path,
                status,
                message,
            } => api_error(status, format!("calling {} {}: {}", method, path, message)),
            OvhError::Http(e) => match e.status() {
                Some(status) => api_error(status.as_u16(), e.to_string()),
                None => CloudError::Transport(e.to_string()),
            },
            OvhError::JsonError(e) => CloudError::Json(e),
            OvhError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            OvhError::Cloud(e) => e,
        }
    }
}

/// Statuses that mean the token was refused
fn api_error(status: u16, message: String) -> CloudError {
    match status {
        401 | 403 => CloudError::AuthenticationFailed(message),
        _ => CloudError::Api { status, message },
    }
}

pub type Result<T> = std::result::Result<T, OvhError>;
