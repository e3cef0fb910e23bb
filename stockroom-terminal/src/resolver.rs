//! Barcode resolver
//!
//! Turns a scanned or typed barcode into the record that prefills the edit
//! form:
//!
//! 1. A known product with the same barcode in the active month is returned
//!    as-is; scanning it again means "edit", never "duplicate".
//! 2. Otherwise a draft is assembled from the price cache, then the catalog
//!    (only when the cache gave no name), then neutral defaults. A source
//!    never overwrites a field filled by an earlier one.

use crate::inference::{self, Inference};
use crate::price_cache::{PriceCache, PriceEntry};
use rust_decimal::Decimal;
use shared::models::{Barcode, CategoryCode, InventoryMonth, Product, TaxRate};
use std::sync::Arc;
use stockroom_client::{CatalogLookup, CatalogSource, CatalogTagSet};

#[derive(Debug, Clone, PartialEq)]
pub enum ResolverResult {
    /// Record already counted this month
    ExistingMatch(Product),
    /// Unpersisted record to prefill the form
    Draft(Product),
}

impl ResolverResult {
    pub fn product(&self) -> &Product {
        match self {
            Self::ExistingMatch(p) | Self::Draft(p) => p,
        }
    }

    pub fn into_product(self) -> Product {
        match self {
            Self::ExistingMatch(p) | Self::Draft(p) => p,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, Self::ExistingMatch(_))
    }
}

/// Draft fields collected so far; `None` means "still open"
#[derive(Debug, Default)]
struct DraftFields {
    name: Option<String>,
    purchase_price: Option<Decimal>,
    category: Option<CategoryCode>,
    tax_rate: Option<TaxRate>,
}

impl DraftFields {
    fn fill_name(&mut self, name: &str) {
        let name = name.trim();
        if self.name.is_none() && !name.is_empty() {
            self.name = Some(name.to_string());
        }
    }

    fn fill_category(&mut self, category: Option<CategoryCode>) {
        if self.category.is_none() {
            self.category = category;
        }
    }

    fn fill_tax_rate(&mut self, tax_rate: Option<TaxRate>) {
        if self.tax_rate.is_none() {
            self.tax_rate = tax_rate;
        }
    }

    fn apply_price_entry(&mut self, entry: &PriceEntry) {
        self.fill_name(&entry.name);
        if self.purchase_price.is_none() {
            self.purchase_price = entry.purchase_price;
        }
        self.fill_category(entry.category.clone());
        self.fill_tax_rate(entry.tax_rate);
    }

    fn apply_catalog(&mut self, catalog: &CatalogTagSet) {
        let Inference { category, tax_rate } = inference::infer(&catalog.tags);
        self.fill_category(Some(category));
        self.fill_tax_rate(Some(tax_rate));
        self.fill_name(&catalog.name);
    }

    fn into_draft(self, barcode: &Barcode, month: &InventoryMonth) -> Product {
        let category = self.category.unwrap_or_default();
        let tax_rate = inference::apply_category_override(&category, self.tax_rate.unwrap_or_default());

        let mut draft = Product::draft(month.clone());
        draft.name = self.name.unwrap_or_default();
        draft.purchase_price = self.purchase_price;
        draft.category = category;
        draft.tax_rate = tax_rate;
        draft.barcode = Some(barcode.clone());
        draft
    }
}

pub struct BarcodeResolver {
    price_cache: Arc<PriceCache>,
    catalog: Arc<dyn CatalogSource>,
}

impl BarcodeResolver {
    pub fn new(price_cache: Arc<PriceCache>, catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            price_cache,
            catalog,
        }
    }

    /// Resolve a barcode against the active month
    ///
    /// Never fails: an unreachable catalog just contributes nothing.
    pub async fn resolve(
        &self,
        barcode: &Barcode,
        current_month: &InventoryMonth,
        known_products: &[Product],
    ) -> ResolverResult {
        if let Some(existing) = known_products
            .iter()
            .find(|p| p.occupies(barcode, current_month))
        {
            tracing::debug!(barcode = %barcode, product_id = ?existing.id, "Barcode already counted this month");
            return ResolverResult::ExistingMatch(existing.clone());
        }

        let mut fields = DraftFields::default();

        if let Some(entry) = self.price_cache.find(barcode) {
            tracing::debug!(barcode = %barcode, "Price cache hit");
            fields.apply_price_entry(entry);
        }

        if fields.name.is_none() {
            match self.catalog.lookup(barcode).await {
                CatalogLookup::Found(catalog) => fields.apply_catalog(&catalog),
                CatalogLookup::Unavailable => {
                    tracing::debug!(barcode = %barcode, "No catalog data, using defaults");
                }
            }
        }

        let draft = fields.into_draft(barcode, current_month);
        tracing::info!(
            barcode = %barcode,
            name = %draft.name,
            category = %draft.category,
            tax_rate = %draft.tax_rate,
            "Draft resolved"
        );
        ResolverResult::Draft(draft)
    }
}
