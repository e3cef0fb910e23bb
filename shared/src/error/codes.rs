//! Unified error codes
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 6xxx: Product errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// Represented as u16 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Authentication required
    NotAuthenticated = 7,
    /// Permission denied
    PermissionDenied = 8,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,
    /// Barcode already used in the same inventory month
    DuplicateBarcode = 6002,
    /// Barcode is not a numeric string
    InvalidBarcode = 6003,
    /// Inventory month is not a YYYY-MM token
    InvalidInventoryMonth = 6004,
    /// Tax rate is not one of the allowed percentages
    InvalidTaxRate = 6005,
    /// Category not found
    CategoryNotFound = 6101,
    /// Category code already exists
    CategoryExists = 6102,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Local storage error
    StorageError = 9002,
    /// Network unreachable or timed out
    NetworkError = 9003,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::NotAuthenticated => "Authentication required",
            ErrorCode::PermissionDenied => "Permission denied",

            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::DuplicateBarcode => "Barcode already exists for this inventory month",
            ErrorCode::InvalidBarcode => "Barcode must contain digits only",
            ErrorCode::InvalidInventoryMonth => "Inventory month must be formatted as YYYY-MM",
            ErrorCode::InvalidTaxRate => "Tax rate is not an allowed percentage",
            ErrorCode::CategoryNotFound => "Category not found",
            ErrorCode::CategoryExists => "Category already exists",

            ErrorCode::InternalError => "Internal error",
            ErrorCode::StorageError => "Local storage error",
            ErrorCode::NetworkError => "Network error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),
            7 => Ok(ErrorCode::NotAuthenticated),
            8 => Ok(ErrorCode::PermissionDenied),

            6001 => Ok(ErrorCode::ProductNotFound),
            6002 => Ok(ErrorCode::DuplicateBarcode),
            6003 => Ok(ErrorCode::InvalidBarcode),
            6004 => Ok(ErrorCode::InvalidInventoryMonth),
            6005 => Ok(ErrorCode::InvalidTaxRate),
            6101 => Ok(ErrorCode::CategoryNotFound),
            6102 => Ok(ErrorCode::CategoryExists),

            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageError),
            9003 => Ok(ErrorCode::NetworkError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
