//! Client error types

use shared::error::AppError;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication required
    #[error("Authentication required")]
    Unauthorized,

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found; carries the backend's message
    #[error("{0}")]
    NotFound(String),

    /// Backend refused the payload (400/409/422)
    #[error("{0}")]
    Rejected(AppError),

    /// Server-side failure
    #[error("Server error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Validation or uniqueness conflict reported by the backend
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Rejected(_))
    }

    /// Network failure or server-side error; the same request may succeed later
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_) | ClientError::Internal(_))
    }

    /// Credentials missing or refused
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::Forbidden(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
