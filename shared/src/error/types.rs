//! Error types and the backend error payload

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Application error with structured error code and details
///
/// `message` is what the user sees. For backend rejections it is the
/// backend's own detail string, unmodified.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct AppError {
    /// The error code identifying the type of error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details (field-level errors, context, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, Value>>,
}

impl AppError {
    /// Create a new error with the default message for the error code
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            details: None,
        }
    }

    /// Create a new error with a custom message
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Add a detail entry to this error
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Error body returned by the inventory backend
///
/// Two shapes are accepted: `{"detail": "..."}` and
/// `{"code": 6002, "message": "...", "details": {...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl ApiErrorBody {
    /// Human-readable text, `detail` first
    pub fn text(&self) -> Option<&str> {
        self.detail
            .as_deref()
            .or(self.message.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// Convert a non-success response into an [`AppError`]
    ///
    /// `raw` is the undecoded response text, used verbatim when the body
    /// carries no recognised message field.
    pub fn into_app_error(self, status: StatusCode, raw: &str) -> AppError {
        let code = self
            .code
            .and_then(|c| ErrorCode::try_from(c).ok())
            .unwrap_or_else(|| ErrorCode::from_status(status));

        let message = match self.text() {
            Some(text) => text.to_string(),
            None if !raw.trim().is_empty() => raw.to_string(),
            None => code.message().to_string(),
        };

        let mut err = AppError::with_message(code, message);
        if let Some(Value::Object(map)) = self.details {
            for (k, v) in map {
                err = err.with_detail(k, v);
            }
        }
        err
    }

    /// Parse a response body; unknown shapes become an empty body
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }
}
