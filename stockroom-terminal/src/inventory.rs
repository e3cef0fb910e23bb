//! In-memory view of the active inventory month
//!
//! Read by the resolver, replaced only by the write queue after a
//! successful delivery (or an explicit refresh through the queue).

use parking_lot::RwLock;
use shared::models::{InventoryMonth, InventoryStats, Product};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InventorySnapshot {
    pub month: InventoryMonth,
    pub products: Vec<Product>,
    pub stats: InventoryStats,
    /// Epoch millis of the last successful refresh
    pub refreshed_at: Option<i64>,
}

/// Shared handle to the inventory snapshot
#[derive(Debug, Clone)]
pub struct SharedInventory {
    inner: Arc<RwLock<InventorySnapshot>>,
}

impl SharedInventory {
    pub fn new(month: InventoryMonth) -> Self {
        Self {
            inner: Arc::new(RwLock::new(InventorySnapshot {
                month,
                products: Vec::new(),
                stats: InventoryStats::default(),
                refreshed_at: None,
            })),
        }
    }

    pub fn month(&self) -> InventoryMonth {
        self.inner.read().month.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        self.inner.read().products.clone()
    }

    pub fn stats(&self) -> InventoryStats {
        self.inner.read().stats.clone()
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.inner.read().clone()
    }

    /// Switch to a new active month, dropping the old month's data
    ///
    /// Returns `false` when `month` is already active.
    pub fn advance_to(&self, month: InventoryMonth) -> bool {
        let mut guard = self.inner.write();
        if guard.month == month {
            return false;
        }
        tracing::info!(from = %guard.month, to = %month, "Inventory month changed");
        *guard = InventorySnapshot {
            month,
            products: Vec::new(),
            stats: InventoryStats::default(),
            refreshed_at: None,
        };
        true
    }

    /// Install freshly loaded data; ignored when fetched for a month that is
    /// no longer active
    pub(crate) fn replace(&self, month: &InventoryMonth, products: Vec<Product>, stats: InventoryStats) {
        let mut guard = self.inner.write();
        if &guard.month != month {
            tracing::debug!(stale = %month, active = %guard.month, "Discarding inventory of previous month");
            return;
        }
        guard.products = products;
        guard.stats = stats;
        guard.refreshed_at = Some(shared::util::now_millis());
    }

    /// Seed the product list without a backend round trip
    #[cfg(test)]
    pub(crate) fn seed(&self, products: Vec<Product>) {
        self.inner.write().products = products;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(value: &str) -> InventoryMonth {
        InventoryMonth::parse(value).unwrap()
    }

    fn named(name: &str, m: &str) -> Product {
        let mut product = Product::draft(month(m));
        product.name = name.to_string();
        product
    }

    #[test]
    fn test_advance_to_new_month_clears_snapshot() {
        let inventory = SharedInventory::new(month("2025-12"));
        inventory.replace(&month("2025-12"), vec![named("Coca-Cola", "2025-12")], InventoryStats::default());

        assert!(!inventory.advance_to(month("2025-12")));
        assert_eq!(inventory.products().len(), 1);

        assert!(inventory.advance_to(month("2026-01")));
        let snapshot = inventory.snapshot();
        assert_eq!(snapshot.month, month("2026-01"));
        assert!(snapshot.products.is_empty());
        assert!(snapshot.refreshed_at.is_none());
    }

    #[test]
    fn test_refresh_for_previous_month_is_ignored() {
        let inventory = SharedInventory::new(month("2026-01"));
        inventory.replace(&month("2025-12"), vec![named("Coca-Cola", "2025-12")], InventoryStats::default());

        assert!(inventory.products().is_empty());
        assert!(inventory.snapshot().refreshed_at.is_none());
    }
}
