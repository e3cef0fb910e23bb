//! Offline write queue
//!
//! Submit pipeline for product creates and updates:
//!
//! 1. Append a `Pending` entry to redb before touching the network
//! 2. Deliver to the backend
//! 3. On success mark `Sent` and refresh the shared inventory; on a refusal
//!    (validation conflict, unknown product) mark `Rejected` and surface the
//!    backend detail; on a transport failure keep `Pending` and register the
//!    retry task
//!
//! Refused credentials keep the entry `Pending` for the periodic scan, but
//! are reported to the caller instead of being queued silently.
//!
//! The [`RetryWorker`] replays pending entries through the same delivery
//! path.

mod storage;
mod worker;

pub use storage::{QueueStats, QueueStorage, QueueStorageError, StorageResult};
pub use worker::{RetryHandle, RetryPolicy, RetryScheduler, RetryWorker, retry_channel};

use crate::inventory::SharedInventory;
use shared::models::{Product, QueuedWrite, WriteOperation};
use shared::util::{monotonic_token, now_millis};
use std::sync::Arc;
use stockroom_client::{ClientError, ClientResult, InventoryBackend};
use thiserror::Error;

/// Retry task registered with the scheduler after a transport failure
pub const RETRY_TASK_TAG: &str = "product-sync";

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Backend accepted the write; carries the persisted product
    Delivered(Product),
    /// Stored locally, delivery deferred
    Queued { token: i64 },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Backend refused the payload; `detail` is its message verbatim
    #[error("{detail}")]
    Conflict { detail: String, token: i64 },

    /// Backend refused the credentials; the write stays stored
    #[error("{detail}")]
    Unauthorized { detail: String, token: i64 },

    /// Neither stored locally nor delivered
    #[error("Write could not be stored: {0}")]
    Storage(#[from] QueueStorageError),
}

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Result of replaying one queued entry
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    Delivered,
    Rejected,
    Failed { retry_count: u32, error: String },
}

/// How a failed delivery is recorded
enum Failure {
    /// Unreachable or failing backend; the same request may succeed later
    Transport(String),
    /// Payload refused; never replayed
    Refused(String),
    /// Credentials refused; replayed once they are fixed
    Unauthorized(String),
}

impl From<ClientError> for Failure {
    fn from(err: ClientError) -> Self {
        if err.is_transport() {
            return Failure::Transport(err.to_string());
        }
        if err.is_auth() {
            return Failure::Unauthorized(err.to_string());
        }
        match err {
            ClientError::Rejected(app) => Failure::Refused(app.message),
            other => Failure::Refused(other.to_string()),
        }
    }
}

pub struct WriteQueue {
    storage: QueueStorage,
    backend: Arc<dyn InventoryBackend>,
    inventory: SharedInventory,
    scheduler: Arc<dyn RetryScheduler>,
}

impl WriteQueue {
    pub fn new(
        storage: QueueStorage,
        backend: Arc<dyn InventoryBackend>,
        inventory: SharedInventory,
        scheduler: Arc<dyn RetryScheduler>,
    ) -> Self {
        Self {
            storage,
            backend,
            inventory,
            scheduler,
        }
    }

    pub fn storage(&self) -> &QueueStorage {
        &self.storage
    }

    pub fn inventory(&self) -> &SharedInventory {
        &self.inventory
    }

    /// Create a product from a draft
    pub async fn create(&self, product: Product) -> SubmitResult<SubmitOutcome> {
        self.submit(WriteOperation::create(), product).await
    }

    /// Overwrite an existing product
    pub async fn update(&self, id: i64, product: Product) -> SubmitResult<SubmitOutcome> {
        self.submit(WriteOperation::update(id), product).await
    }

    pub async fn submit(
        &self,
        operation: WriteOperation,
        product: Product,
    ) -> SubmitResult<SubmitOutcome> {
        let entry = QueuedWrite::new(monotonic_token(), operation, product, now_millis());

        // A failed append must not lose the mutation: still try to deliver
        let append_error = match self.storage.append(&entry) {
            Ok(_) => None,
            Err(e) => {
                tracing::error!(token = entry.token, error = %e, "Failed to append queued write");
                Some(e)
            }
        };

        self.deliver(&entry, append_error).await
    }

    /// Replace the payload of a still-queued write and try to deliver it
    ///
    /// Fails with [`QueueStorageError::NotPending`] once the entry has left
    /// the queue.
    pub async fn amend(&self, token: i64, product: Product) -> SubmitResult<SubmitOutcome> {
        let entry = self.storage.amend_pending(token, product)?;
        tracing::debug!(token, "Queued write amended");
        self.deliver(&entry, None).await
    }

    async fn deliver(
        &self,
        entry: &QueuedWrite,
        append_error: Option<QueueStorageError>,
    ) -> SubmitResult<SubmitOutcome> {
        let token = entry.token;

        let failure = match self.send(entry).await {
            Ok(saved) => {
                if append_error.is_none() {
                    self.record(token, self.storage.mark_sent(token));
                }
                tracing::info!(token, product_id = ?saved.id, "Write delivered");
                self.refresh_after_delivery().await;
                return Ok(SubmitOutcome::Delivered(saved));
            }
            Err(e) => Failure::from(e),
        };

        match (failure, append_error) {
            (Failure::Refused(detail), append_error) => {
                if append_error.is_none() {
                    self.record(token, self.storage.mark_rejected(token, &detail));
                }
                tracing::warn!(token, barcode = ?entry.product.barcode, detail = %detail, "Write rejected by backend");
                Err(SubmitError::Conflict { detail, token })
            }
            (_, Some(storage_err)) => {
                tracing::error!(token, "Write neither stored nor delivered");
                Err(SubmitError::Storage(storage_err))
            }
            (Failure::Unauthorized(detail), None) => {
                self.record(token, self.storage.mark_failed(token, &detail));
                tracing::error!(token, detail = %detail, "Backend refused credentials, write kept for replay");
                Err(SubmitError::Unauthorized { detail, token })
            }
            (Failure::Transport(error), None) => {
                self.record(token, self.storage.mark_failed(token, &error));
                tracing::warn!(token, error = %error, "Delivery failed, write queued for retry");
                self.scheduler.register(RETRY_TASK_TAG);
                Ok(SubmitOutcome::Queued { token })
            }
        }
    }

    /// Deliver a stored entry again and record the result
    pub async fn replay(&self, entry: &QueuedWrite) -> StorageResult<ReplayOutcome> {
        let token = entry.token;
        let failure = match self.send(entry).await {
            Ok(saved) => {
                self.storage.mark_sent(token)?;
                tracing::info!(token, product_id = ?saved.id, "Queued write delivered");
                self.refresh_after_delivery().await;
                return Ok(ReplayOutcome::Delivered);
            }
            Err(e) => Failure::from(e),
        };

        match failure {
            Failure::Refused(detail) => {
                self.storage.mark_rejected(token, &detail)?;
                tracing::warn!(
                    token,
                    barcode = ?entry.product.barcode,
                    detail = %detail,
                    "Queued write rejected by backend, it will not be retried"
                );
                Ok(ReplayOutcome::Rejected)
            }
            Failure::Unauthorized(error) | Failure::Transport(error) => {
                let updated = self.storage.mark_failed(token, &error)?;
                tracing::debug!(token, retry_count = updated.retry_count, error = %error, "Replay failed");
                Ok(ReplayOutcome::Failed {
                    retry_count: updated.retry_count,
                    error,
                })
            }
        }
    }

    /// Reload product list and statistics of the active month
    pub async fn refresh_inventory(&self) -> ClientResult<()> {
        let month = self.inventory.month();
        let products = self.backend.list_products(&month).await?;
        let stats = self.backend.statistics(&month).await?;
        tracing::debug!(month = %month, products = products.len(), "Inventory refreshed");
        self.inventory.replace(&month, products, stats);
        Ok(())
    }

    async fn refresh_after_delivery(&self) {
        if let Err(e) = self.refresh_inventory().await {
            tracing::warn!(error = %e, "Inventory refresh after delivery failed");
        }
    }

    async fn send(&self, entry: &QueuedWrite) -> ClientResult<Product> {
        match entry.operation {
            WriteOperation::Create { idempotency_key } => {
                self.backend
                    .create_product(&entry.product, idempotency_key)
                    .await
            }
            WriteOperation::Update { id } => self.backend.update_product(id, &entry.product).await,
        }
    }

    fn record<T>(&self, token: i64, result: StorageResult<T>) {
        if let Err(e) = result {
            tracing::error!(token, error = %e, "Failed to update queued write status");
        }
    }
}
