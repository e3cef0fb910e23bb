//! Local price cache
//!
//! Read-only dataset of known purchase prices, keyed by barcode, loaded
//! once at startup:
//!
//! ```json
//! {
//!   "3017620422003": {
//!     "name": "Nutella 400g",
//!     "purchase_price": 3.12,
//!     "category": "non-perishable",
//!     "tax_rate": 5.5
//!   }
//! }
//! ```
//!
//! Every field of an entry is optional. A dataset that cannot be read or
//! parsed leaves the cache empty.

use rust_decimal::Decimal;
use serde::Deserialize;
use shared::models::{Barcode, CategoryCode, TaxRate};
use std::collections::HashMap;
use std::path::Path;

/// Cached facts about one barcode
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub category: Option<CategoryCode>,
    #[serde(default)]
    pub tax_rate: Option<TaxRate>,
}

#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    entries: HashMap<String, PriceEntry>,
}

impl PriceCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PriceEntry)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Load the dataset, falling back to an empty cache
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Price cache unavailable, starting empty");
                return Self::empty();
            }
        };

        match Self::parse(&raw) {
            Ok(cache) => {
                tracing::info!(path = %path.display(), entries = cache.len(), "Price cache loaded");
                cache
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Price cache malformed, starting empty");
                Self::empty()
            }
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: HashMap<String, PriceEntry> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn find(&self, barcode: &Barcode) -> Option<&PriceEntry> {
        self.entries.get(barcode.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
