//! Inventory backend client
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create | `POST /api/products` with `Idempotency-Key` |
//! | update | `PUT /api/products/{id}` |
//! | list | `GET /api/products?month=YYYY-MM` |
//! | statistics | `GET /api/statistics?month=YYYY-MM` |

use crate::{ClientConfig, ClientResult, HttpClient};
use async_trait::async_trait;
use shared::models::{InventoryMonth, InventoryStats, Product};
use uuid::Uuid;

/// Header carrying the client-generated create token
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Product persistence as seen by the write pipeline
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    async fn create_product(&self, product: &Product, idempotency_key: Uuid)
    -> ClientResult<Product>;
    async fn update_product(&self, id: i64, product: &Product) -> ClientResult<Product>;
    async fn list_products(&self, month: &InventoryMonth) -> ClientResult<Vec<Product>>;
    async fn statistics(&self, month: &InventoryMonth) -> ClientResult<InventoryStats>;
}

/// REST client for the inventory backend
#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: HttpClient,
}

impl InventoryClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait]
impl InventoryBackend for InventoryClient {
    async fn create_product(
        &self,
        product: &Product,
        idempotency_key: Uuid,
    ) -> ClientResult<Product> {
        tracing::debug!(barcode = ?product.barcode, key = %idempotency_key, "POST product");
        self.http
            .post(
                "/api/products",
                product,
                &[(IDEMPOTENCY_HEADER, idempotency_key.to_string())],
            )
            .await
    }

    async fn update_product(&self, id: i64, product: &Product) -> ClientResult<Product> {
        tracing::debug!(product_id = id, "PUT product");
        self.http.put(&format!("/api/products/{id}"), product).await
    }

    async fn list_products(&self, month: &InventoryMonth) -> ClientResult<Vec<Product>> {
        self.http
            .get_with_query("/api/products", &[("month", month.as_str())])
            .await
    }

    async fn statistics(&self, month: &InventoryMonth) -> ClientResult<InventoryStats> {
        self.http
            .get_with_query("/api/statistics", &[("month", month.as_str())])
            .await
    }
}
