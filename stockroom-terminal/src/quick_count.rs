//! Quick count: every scan adds one unit
//!
//! An existing product gets its quantity bumped; a named draft is created
//! with quantity 1. While offline the snapshot does not move, so a repeated
//! scan folds into the write that is still queued for the same product
//! instead of queueing a second, conflicting one.

use crate::queue::{QueueStorageError, SubmitError, SubmitOutcome, SubmitResult, WriteQueue};
use crate::resolver::ResolverResult;
use rust_decimal::Decimal;
use shared::models::Product;

#[derive(Debug)]
pub enum CountOutcome {
    /// Nothing submitted
    Skipped(&'static str),
    Submitted(SubmitResult<SubmitOutcome>),
}

pub async fn count_scan(queue: &WriteQueue, result: &ResolverResult) -> CountOutcome {
    match result {
        ResolverResult::ExistingMatch(product) => match product.id {
            Some(id) => CountOutcome::Submitted(count_existing(queue, id, product).await),
            None => CountOutcome::Skipped("existing product without id"),
        },
        ResolverResult::Draft(draft) if draft.name.is_empty() => {
            CountOutcome::Skipped("draft needs a name")
        }
        ResolverResult::Draft(draft) => CountOutcome::Submitted(count_draft(queue, draft).await),
    }
}

async fn count_existing(
    queue: &WriteQueue,
    id: i64,
    product: &Product,
) -> SubmitResult<SubmitOutcome> {
    // A queued edit is newer than the snapshot
    let base = match queue.storage().pending_update(id) {
        Ok(Some(entry)) => entry.product,
        Ok(None) => product.clone(),
        Err(e) => {
            tracing::warn!(product_id = id, error = %e, "Failed to read queued update");
            product.clone()
        }
    };
    queue.update(id, plus_one(base)).await
}

async fn count_draft(
    queue: &WriteQueue,
    draft: &Product,
) -> SubmitResult<SubmitOutcome> {
    let queued = match &draft.barcode {
        Some(barcode) => queue
            .storage()
            .pending_create(barcode, &draft.inventory_month)
            .unwrap_or_else(|e| {
                tracing::warn!(barcode = %barcode, error = %e, "Failed to read queued creates");
                None
            }),
        None => None,
    };

    if let Some(entry) = queued {
        match queue.amend(entry.token, plus_one(entry.product)).await {
            Err(SubmitError::Storage(QueueStorageError::NotPending(token))) => {
                // Delivered meanwhile; the refreshed snapshot now holds it
                tracing::debug!(token, "Queued create left the queue, counting against inventory");
                if let Some(existing) = delivered_copy(queue, draft) {
                    if let Some(id) = existing.id {
                        return queue.update(id, plus_one(existing)).await;
                    }
                }
            }
            other => return other,
        }
    }

    let mut counted = draft.clone();
    counted.quantity = Some(Decimal::ONE);
    queue.create(counted).await
}

fn delivered_copy(queue: &WriteQueue, draft: &Product) -> Option<Product> {
    let barcode = draft.barcode.as_ref()?;
    queue
        .inventory()
        .products()
        .into_iter()
        .find(|p| p.occupies(barcode, &draft.inventory_month))
}

fn plus_one(mut product: Product) -> Product {
    product.quantity = Some(product.quantity.unwrap_or_default() + Decimal::ONE);
    product
}
