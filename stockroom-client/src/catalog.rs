//! Product catalog lookup
//!
//! Queries an Open Food Facts compatible service by barcode. A product the
//! catalog does not know and a catalog that cannot be reached are the same
//! thing to callers: [`CatalogLookup::Unavailable`].

use crate::{ClientConfig, ClientResult, HttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use shared::models::Barcode;
use std::collections::BTreeSet;

/// Name and classification tags of a catalog product
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogTagSet {
    /// Possibly empty
    pub name: String,
    /// Lowercased tags, e.g. `en:beverages`
    pub tags: BTreeSet<String>,
}

impl CatalogTagSet {
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            tags: tags
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Outcome of a catalog lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLookup {
    Found(CatalogTagSet),
    Unavailable,
}

/// Anything that can answer a barcode lookup
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn lookup(&self, barcode: &Barcode) -> CatalogLookup;
}

/// Wire format of `GET /api/v0/product/{barcode}.json`
#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    status: i64,
    #[serde(default)]
    product: Option<CatalogProduct>,
}

#[derive(Debug, Deserialize)]
struct CatalogProduct {
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    categories_tags: Vec<String>,
}

/// HTTP catalog client
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: HttpClient,
}

impl CatalogClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn lookup(&self, barcode: &Barcode) -> CatalogLookup {
        let path = format!("/api/v0/product/{}.json", barcode);
        let response: CatalogResponse = match self.http.get(&path).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(barcode = %barcode, error = %e, "Catalog lookup failed");
                return CatalogLookup::Unavailable;
            }
        };

        match response {
            CatalogResponse {
                status: 1,
                product: Some(product),
            } => {
                let tags = CatalogTagSet::new(
                    product.product_name.unwrap_or_default().trim(),
                    product.categories_tags,
                );
                tracing::debug!(barcode = %barcode, name = %tags.name, tag_count = tags.tags.len(), "Catalog hit");
                CatalogLookup::Found(tags)
            }
            _ => {
                tracing::debug!(barcode = %barcode, "Catalog has no such product");
                CatalogLookup::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_set_normalizes_tags() {
        let tags = CatalogTagSet::new("Coca-Cola", ["en:Beverages ", "", "EN:sodas"]);
        assert_eq!(
            tags.tags.into_iter().collect::<Vec<_>>(),
            vec!["en:beverages".to_string(), "en:sodas".to_string()]
        );
    }

    #[test]
    fn test_wire_format_parses_missing_fields() {
        let response: CatalogResponse =
            serde_json::from_str(r#"{"status": 0, "status_verbose": "product not found"}"#)
                .unwrap();
        assert_eq!(response.status, 0);
        assert!(response.product.is_none());
    }
}
