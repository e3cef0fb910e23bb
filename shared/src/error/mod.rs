//! Unified error system for the Stockroom workspace
//!
//! - [`ErrorCode`]: Standardized error codes
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiErrorBody`]: Error payload returned by the inventory backend
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 6xxx: Product errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::with_message(ErrorCode::DuplicateBarcode, "Barcode already counted this month")
//!     .with_detail("barcode", "5449000000996");
//! assert_eq!(err.code, ErrorCode::DuplicateBarcode);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiErrorBody, AppError, AppResult};
