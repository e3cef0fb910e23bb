//! Shared types for the Stockroom workspace
//!
//! Domain models, the unified error system and small utilities used by both
//! `stockroom-client` and `stockroom-terminal`.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiErrorBody, AppError, AppResult, ErrorCode};
pub use models::{
    Barcode, Category, CategoryCode, InventoryMonth, InventoryStats, Product, QueuedWrite,
    TaxRate, WriteOperation, WriteStatus,
};
