//! Category Model

use super::tax::TaxRate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in category codes
pub mod codes {
    pub const FRESH: &str = "fresh";
    pub const NON_PERISHABLE: &str = "non-perishable";
    pub const DRY_GOODS: &str = "dry-goods";
    pub const HANGING_GOODS: &str = "hanging-goods";
    pub const BEACH_ITEMS: &str = "beach-items";
}

/// Short category code (tenant-extensible)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCode(String);

impl CategoryCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn fresh() -> Self {
        Self::new(codes::FRESH)
    }

    pub fn non_perishable() -> Self {
        Self::new(codes::NON_PERISHABLE)
    }

    pub fn dry_goods() -> Self {
        Self::new(codes::DRY_GOODS)
    }

    pub fn hanging_goods() -> Self {
        Self::new(codes::HANGING_GOODS)
    }

    pub fn beach_items() -> Self {
        Self::new(codes::BEACH_ITEMS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tax rate imposed by the category itself, whatever the product data says
    pub fn forced_tax_rate(&self) -> Option<TaxRate> {
        match self.0.as_str() {
            codes::HANGING_GOODS | codes::BEACH_ITEMS => Some(TaxRate::Standard),
            _ => None,
        }
    }

    /// Whether products in this category carry an expiry date
    pub fn is_perishable(&self) -> bool {
        self.0 != codes::NON_PERISHABLE
    }
}

impl Default for CategoryCode {
    fn default() -> Self {
        Self::dry_goods()
    }
}

impl From<&str> for CategoryCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for CategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub code: CategoryCode,
    pub label: String,
}

impl Category {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: CategoryCode::new(code),
            label: label.into(),
        }
    }

    /// Default tax rate associated with this category, if any
    pub fn default_tax_rate(&self) -> Option<TaxRate> {
        self.code.forced_tax_rate()
    }

    /// The categories every tenant starts with
    pub fn builtin() -> Vec<Category> {
        vec![
            Category::new(codes::FRESH, "Fresh"),
            Category::new(codes::NON_PERISHABLE, "Non-perishable"),
            Category::new(codes::DRY_GOODS, "Dry goods"),
            Category::new(codes::HANGING_GOODS, "Hanging goods"),
            Category::new(codes::BEACH_ITEMS, "Beach items"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_tax_rate() {
        assert_eq!(CategoryCode::hanging_goods().forced_tax_rate(), Some(TaxRate::Standard));
        assert_eq!(CategoryCode::beach_items().forced_tax_rate(), Some(TaxRate::Standard));
        assert_eq!(CategoryCode::fresh().forced_tax_rate(), None);
        assert_eq!(CategoryCode::new("garden").forced_tax_rate(), None);
    }

    #[test]
    fn test_code_is_transparent_in_json() {
        let json = serde_json::to_string(&CategoryCode::dry_goods()).unwrap();
        assert_eq!(json, "\"dry-goods\"");
    }
}
