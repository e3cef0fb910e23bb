//! Tenant-scoped category store
//!
//! Seeded with the built-in categories. Removal asks an injected
//! [`Confirm`] capability before dropping anything.

use shared::models::{Category, CategoryCode, TaxRate};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("Category already exists: {0}")]
    Duplicate(String),

    #[error("Unknown category: {0}")]
    Unknown(String),

    #[error("Category label must not be empty")]
    EmptyLabel,

    #[error("Category code must not be empty")]
    EmptyCode,

    #[error("Removal of {0} declined")]
    Declined(String),
}

pub type CategoryResult<T> = Result<T, CategoryError>;

/// User confirmation for destructive edits
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone)]
pub struct CategoryStore {
    tenant_id: String,
    categories: Vec<Category>,
}

impl CategoryStore {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            categories: Category::builtin(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn list(&self) -> &[Category] {
        &self.categories
    }

    pub fn get(&self, code: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.code.as_str() == code)
    }

    pub fn add(&mut self, code: &str, label: &str) -> CategoryResult<&[Category]> {
        let code = code.trim();
        if code.is_empty() {
            return Err(CategoryError::EmptyCode);
        }
        let label = non_empty_label(label)?;
        if self.get(code).is_some() {
            return Err(CategoryError::Duplicate(code.to_string()));
        }

        self.categories.push(Category::new(code, label));
        tracing::info!(tenant = %self.tenant_id, code, "Category added");
        Ok(&self.categories)
    }

    pub fn rename(&mut self, code: &str, label: &str) -> CategoryResult<&[Category]> {
        let label = non_empty_label(label)?;
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.code.as_str() == code)
            .ok_or_else(|| CategoryError::Unknown(code.to_string()))?;

        category.label = label.to_string();
        tracing::info!(tenant = %self.tenant_id, code, "Category renamed");
        Ok(&self.categories)
    }

    pub fn remove(&mut self, code: &str, confirm: &dyn Confirm) -> CategoryResult<&[Category]> {
        let index = self
            .categories
            .iter()
            .position(|c| c.code.as_str() == code)
            .ok_or_else(|| CategoryError::Unknown(code.to_string()))?;

        let prompt = format!("Remove category \"{}\"?", self.categories[index].label);
        if !confirm.confirm(&prompt) {
            return Err(CategoryError::Declined(code.to_string()));
        }

        self.categories.remove(index);
        tracing::info!(tenant = %self.tenant_id, code, "Category removed");
        Ok(&self.categories)
    }

    /// Tax rate a category imposes, if any
    pub fn default_tax_rate(&self, code: &str) -> Option<TaxRate> {
        CategoryCode::from(code).forced_tax_rate()
    }
}

fn non_empty_label(label: &str) -> CategoryResult<&str> {
    let label = label.trim();
    if label.is_empty() {
        Err(CategoryError::EmptyLabel)
    } else {
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn codes(list: &[Category]) -> Vec<&str> {
        list.iter().map(|c| c.code.as_str()).collect()
    }

    #[test]
    fn test_seeded_with_builtins() {
        let store = CategoryStore::new("tenant-1");
        assert_eq!(
            codes(store.list()),
            vec!["fresh", "non-perishable", "dry-goods", "hanging-goods", "beach-items"]
        );
        assert_eq!(store.tenant_id(), "tenant-1");
    }

    #[test]
    fn test_add_and_rename() {
        let mut store = CategoryStore::new("t");
        let list = store.add("garden", " Garden ").unwrap();
        assert_eq!(list.len(), 6);
        assert_eq!(store.get("garden").unwrap().label, "Garden");

        store.rename("garden", "Garden & patio").unwrap();
        assert_eq!(store.get("garden").unwrap().label, "Garden & patio");
    }

    #[test]
    fn test_add_rejects_duplicates_and_blanks() {
        let mut store = CategoryStore::new("t");
        assert_eq!(
            store.add("fresh", "Fresh again"),
            Err(CategoryError::Duplicate("fresh".into()))
        );
        assert_eq!(store.add("garden", "  "), Err(CategoryError::EmptyLabel));
        assert_eq!(store.add(" ", "Garden"), Err(CategoryError::EmptyCode));
        assert_eq!(store.rename("garden", "Garden"), Err(CategoryError::Unknown("garden".into())));
    }

    #[test]
    fn test_remove_asks_for_confirmation() {
        let mut store = CategoryStore::new("t");
        let prompts = RefCell::new(Vec::new());

        let decline = |prompt: &str| {
            prompts.borrow_mut().push(prompt.to_string());
            false
        };
        assert_eq!(
            store.remove("beach-items", &decline),
            Err(CategoryError::Declined("beach-items".into()))
        );
        assert_eq!(store.list().len(), 5);
        assert_eq!(prompts.borrow()[0], "Remove category \"Beach items\"?");

        let accept = |_: &str| true;
        let list = store.remove("beach-items", &accept).unwrap();
        assert!(!codes(list).contains(&"beach-items"));
        assert_eq!(
            store.remove("beach-items", &accept),
            Err(CategoryError::Unknown("beach-items".into()))
        );
    }

    #[test]
    fn test_default_tax_rate() {
        let store = CategoryStore::new("t");
        assert_eq!(store.default_tax_rate("hanging-goods"), Some(TaxRate::Standard));
        assert_eq!(store.default_tax_rate("beach-items"), Some(TaxRate::Standard));
        assert_eq!(store.default_tax_rate("fresh"), None);
    }
}
