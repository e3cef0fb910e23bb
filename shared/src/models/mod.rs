//! Domain models

pub mod barcode;
pub mod category;
pub mod month;
pub mod product;
pub mod queued_write;
pub mod stats;
pub mod tax;

pub use barcode::Barcode;
pub use category::{Category, CategoryCode};
pub use month::InventoryMonth;
pub use product::Product;
pub use queued_write::{QueuedWrite, WriteOperation, WriteStatus};
pub use stats::InventoryStats;
pub use tax::TaxRate;
