//! Category and tax-rate inference from catalog tags
//!
//! Rules are evaluated in table order and the first one whose keyword
//! appears in any tag wins. Tags are compared lowercased, by substring, so
//! `en:dairies` and `fr:produits-laitiers-dairies` both hit `dairies`.

use shared::models::{CategoryCode, TaxRate};
use shared::models::category::codes;

/// Ordered category rules: (keywords, category code)
const CATEGORY_RULES: &[(&[&str], &str)] = &[
    (&["dairies", "dairy", "meat", "fish", "seafood", "fresh-food"], codes::FRESH),
    (&["canned", "sauce", "spread"], codes::NON_PERISHABLE),
    (&["cereal", "pasta", "beverage"], codes::DRY_GOODS),
    (&["clothing", "clothes", "textile"], codes::HANGING_GOODS),
    (&["beach", "outdoor", "recreation"], codes::BEACH_ITEMS),
];

const NON_FOOD_KEYWORDS: &[&str] = &["non-food"];
const PREPARED_MEAL_KEYWORDS: &[&str] = &["restaurant", "prepared-meal", "ready-meal"];

/// Result of tag inference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inference {
    pub category: CategoryCode,
    pub tax_rate: TaxRate,
}

fn any_tag_contains(tags: &[String], keywords: &[&str]) -> bool {
    tags.iter()
        .any(|tag| keywords.iter().any(|keyword| tag.contains(keyword)))
}

/// Infer category and tax rate from catalog tags
///
/// The category-imposed tax override is not applied here; see
/// [`apply_category_override`].
pub fn infer<I, S>(tags: I) -> Inference
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.as_ref().to_lowercase())
        .collect();

    let category = CATEGORY_RULES
        .iter()
        .find(|(keywords, _)| any_tag_contains(&tags, keywords))
        .map(|(_, code)| CategoryCode::new(*code))
        .unwrap_or_else(CategoryCode::dry_goods);

    let tax_rate = if any_tag_contains(&tags, NON_FOOD_KEYWORDS) {
        TaxRate::Standard
    } else if any_tag_contains(&tags, PREPARED_MEAL_KEYWORDS) {
        TaxRate::Intermediate
    } else {
        TaxRate::Reduced
    };

    Inference { category, tax_rate }
}

/// Tax rate after the category has had its say
pub fn apply_category_override(category: &CategoryCode, tax_rate: TaxRate) -> TaxRate {
    category.forced_tax_rate().unwrap_or(tax_rate)
}
