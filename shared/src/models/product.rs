//! Product Model

use super::barcode::{self, Barcode};
use super::category::CategoryCode;
use super::month::InventoryMonth;
use super::tax::TaxRate;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product entity
///
/// A product without `id` is a draft: it prefills the edit form and becomes
/// persisted once the backend accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: CategoryCode,
    #[serde(default)]
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub tax_rate: TaxRate,
    /// Absent for non-perishable goods
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// Unset on a fresh draft until the user counts the stock
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "barcode::deserialize_optional")]
    pub barcode: Option<Barcode>,
    pub inventory_month: InventoryMonth,
}

impl Product {
    /// Blank draft for the given month
    pub fn draft(inventory_month: InventoryMonth) -> Self {
        Self {
            id: None,
            name: String::new(),
            category: CategoryCode::default(),
            purchase_price: None,
            selling_price: None,
            tax_rate: TaxRate::default(),
            expiry_date: None,
            quantity: None,
            barcode: None,
            inventory_month,
        }
    }

    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }

    /// Whether this record occupies the (barcode, month) slot
    pub fn occupies(&self, barcode: &Barcode, month: &InventoryMonth) -> bool {
        self.barcode.as_ref() == Some(barcode) && &self.inventory_month == month
    }

    /// Change the category, keeping tax and expiry consistent with it
    ///
    /// Categories with a forced tax rate impose it; a non-perishable category
    /// drops the expiry date.
    pub fn set_category(&mut self, category: CategoryCode) {
        if let Some(rate) = category.forced_tax_rate() {
            self.tax_rate = rate;
        }
        if !category.is_perishable() {
            self.expiry_date = None;
        }
        self.category = category;
    }

    /// Stock value at purchase price, when both figures are known
    pub fn purchase_value(&self) -> Option<Decimal> {
        Some(self.purchase_price? * self.quantity?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month() -> InventoryMonth {
        InventoryMonth::parse("2025-12").unwrap()
    }

    #[test]
    fn test_blank_draft_defaults() {
        let draft = Product::draft(month());
        assert!(draft.is_draft());
        assert_eq!(draft.name, "");
        assert_eq!(draft.category, CategoryCode::dry_goods());
        assert_eq!(draft.tax_rate, TaxRate::Reduced);
        assert!(draft.quantity.is_none());
    }

    #[test]
    fn test_set_category_reapplies_forced_tax() {
        let mut draft = Product::draft(month());
        draft.set_category(CategoryCode::beach_items());
        assert_eq!(draft.tax_rate, TaxRate::Standard);

        // Leaving the category does not reset a user-chosen rate
        draft.set_category(CategoryCode::fresh());
        assert_eq!(draft.tax_rate, TaxRate::Standard);
    }

    #[test]
    fn test_set_category_non_perishable_drops_expiry() {
        let mut draft = Product::draft(month());
        draft.expiry_date = NaiveDate::from_ymd_opt(2026, 1, 31);
        draft.set_category(CategoryCode::non_perishable());
        assert!(draft.expiry_date.is_none());
    }

    #[test]
    fn test_deserialize_backend_record() {
        let json = r#"{
            "id": 7,
            "name": "Coca-Cola",
            "category": "dry-goods",
            "purchase_price": 0.85,
            "selling_price": 1.5,
            "tax_rate": 5.5,
            "expiry_date": null,
            "quantity": 24,
            "barcode": "5449000000996",
            "inventory_month": "2025-12"
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, Some(7));
        assert_eq!(product.barcode.as_ref().map(Barcode::as_str), Some("5449000000996"));
        assert_eq!(product.quantity, Some(Decimal::from(24)));
        assert!(product.occupies(&Barcode::parse("5449000000996").unwrap(), &month()));
    }

    #[test]
    fn test_amounts_serialize_as_numbers() {
        let mut product = Product::draft(month());
        product.purchase_price = Some(Decimal::new(45, 2));
        product.quantity = Some(Decimal::from(3));

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["purchase_price"], serde_json::json!(0.45));
        assert_eq!(json["quantity"].as_f64(), Some(3.0));
        assert_eq!(json["tax_rate"], serde_json::json!(5.5));
    }

    #[test]
    fn test_empty_barcode_is_absent() {
        let json = r#"{"name": "Serviette", "barcode": "", "inventory_month": "2025-12"}"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert!(product.barcode.is_none());
    }
}
