//! Stockroom Client - HTTP clients for the inventory backend and the
//! external product catalog
//!
//! - [`InventoryClient`]: create/update/list products and read statistics
//! - [`CatalogClient`]: look up a barcode in the product catalog

pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod inventory;

pub use catalog::{CatalogClient, CatalogLookup, CatalogSource, CatalogTagSet};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use inventory::{InventoryBackend, InventoryClient};
