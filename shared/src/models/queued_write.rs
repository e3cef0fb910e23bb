//! Offline write queue entries

use super::product::Product;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a queued write does on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteOperation {
    /// POST a new product; the key lets the backend drop replays
    Create { idempotency_key: Uuid },
    /// PUT over an existing product
    Update { id: i64 },
}

impl WriteOperation {
    pub fn create() -> Self {
        Self::Create {
            idempotency_key: Uuid::new_v4(),
        }
    }

    pub fn update(id: i64) -> Self {
        Self::Update { id }
    }

    /// Target product id for updates
    pub fn target_id(&self) -> Option<i64> {
        match self {
            Self::Create { .. } => None,
            Self::Update { id } => Some(*id),
        }
    }
}

/// Delivery status of a queued write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// Recorded locally, not yet confirmed by the backend
    Pending,
    /// Accepted by the backend
    Sent,
    /// Refused by backend validation; kept for the user to correct
    Rejected,
    /// Replaced by a newer update of the same product before delivery
    Superseded,
    /// Retry budget exhausted
    DeadLetter,
}

/// A durable record of a create/update, written before any network attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    /// Locally generated monotonic token
    pub token: i64,
    pub operation: WriteOperation,
    /// Payload at submission time
    pub product: Product,
    pub status: WriteStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl QueuedWrite {
    pub fn new(token: i64, operation: WriteOperation, product: Product, now: i64) -> Self {
        Self {
            token,
            operation,
            product,
            status: WriteStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == WriteStatus::Pending
    }
}
