//! Inventory statistics

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregates for one inventory month, as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryStats {
    pub product_count: u64,
    pub total_quantity: Decimal,
    pub purchase_value: Decimal,
    pub selling_value: Decimal,
}
