// stockroom-terminal/tests/offline_sync.rs
// Write queue against a local axum backend with an on-disk queue

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use shared::models::{Barcode, InventoryMonth, InventoryStats, Product, WriteStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use stockroom_client::{ClientConfig, InventoryClient};
use stockroom_terminal::{
    QueueStorage, RetryPolicy, RetryWorker, SharedInventory, SubmitError, SubmitOutcome,
    WriteQueue, retry_channel,
};
use tokio_util::sync::CancellationToken;

/// In-process inventory backend enforcing (barcode, month) uniqueness
#[derive(Default)]
struct Backend {
    down: AtomicBool,
    /// Commit writes but answer 503, as if the response got lost
    lose_responses: AtomicBool,
    products: Mutex<Vec<Product>>,
    keys: Mutex<HashMap<String, i64>>,
}

type SharedBackend = Arc<Backend>;

async fn create_product(
    State(backend): State<SharedBackend>,
    headers: HeaderMap,
    Json(mut product): Json<Product>,
) -> Response {
    if backend.down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }

    let key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let mut products = backend.products.lock();
    let mut keys = backend.keys.lock();

    if let Some(id) = key.as_ref().and_then(|k| keys.get(k)) {
        let existing = products.iter().find(|p| p.id == Some(*id)).cloned();
        return Json(existing).into_response();
    }

    let taken = products.iter().any(|p| {
        p.barcode.is_some()
            && p.barcode == product.barcode
            && p.inventory_month == product.inventory_month
    });
    if taken {
        let detail = format!(
            "Product with barcode {} already exists for {}",
            product.barcode.as_ref().map(|b| b.as_str()).unwrap_or_default(),
            product.inventory_month
        );
        return (StatusCode::CONFLICT, Json(json!({ "detail": detail }))).into_response();
    }

    let id = products.len() as i64 + 1;
    product.id = Some(id);
    products.push(product.clone());
    if let Some(key) = key {
        keys.insert(key, id);
    }

    if backend.lose_responses.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "gateway timeout").into_response();
    }
    Json(product).into_response()
}

async fn update_product(
    State(backend): State<SharedBackend>,
    Path(id): Path<i64>,
    Json(mut product): Json<Product>,
) -> Response {
    if backend.down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance").into_response();
    }
    let mut products = backend.products.lock();
    match products.iter_mut().find(|p| p.id == Some(id)) {
        Some(slot) => {
            product.id = Some(id);
            *slot = product.clone();
            Json(product).into_response()
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "not found" }))).into_response(),
    }
}

async fn list_products(
    State(backend): State<SharedBackend>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Vec<Product>> {
    let month = query.get("month").cloned().unwrap_or_default();
    Json(
        backend
            .products
            .lock()
            .iter()
            .filter(|p| p.inventory_month.as_str() == month)
            .cloned()
            .collect(),
    )
}

async fn statistics(
    State(backend): State<SharedBackend>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<InventoryStats> {
    let month = query.get("month").cloned().unwrap_or_default();
    let products = backend.products.lock();
    let in_month: Vec<&Product> = products
        .iter()
        .filter(|p| p.inventory_month.as_str() == month)
        .collect();
    Json(InventoryStats {
        product_count: in_month.len() as u64,
        total_quantity: in_month.iter().filter_map(|p| p.quantity).sum(),
        ..Default::default()
    })
}

async fn serve(backend: SharedBackend) -> String {
    let app = Router::new()
        .route("/api/products", post(create_product).get(list_products))
        .route("/api/products/{id}", put(update_product))
        .route("/api/statistics", get(statistics))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn month() -> InventoryMonth {
    InventoryMonth::parse("2025-12").unwrap()
}

fn coca_cola() -> Product {
    let mut product = Product::draft(month());
    product.name = "Coca-Cola".into();
    product.barcode = Some(Barcode::parse("5449000000996").unwrap());
    product.quantity = Some(Decimal::from(24));
    product
}

fn write_queue(base: &str, storage: QueueStorage) -> Arc<WriteQueue> {
    let backend = InventoryClient::new(&ClientConfig::new(base).with_timeout(2)).unwrap();
    let (handle, _rx) = retry_channel();
    Arc::new(WriteQueue::new(
        storage,
        Arc::new(backend),
        SharedInventory::new(month()),
        Arc::new(handle),
    ))
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_delivered_create_updates_snapshot() {
    let backend = SharedBackend::default();
    let base = serve(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let queue = write_queue(&base, QueueStorage::open(dir.path().join("queue.redb")).unwrap());

    let outcome = queue.create(coca_cola()).await.unwrap();
    let SubmitOutcome::Delivered(saved) = outcome else {
        panic!("expected delivery");
    };
    assert_eq!(saved.id, Some(1));

    let snapshot = queue.inventory().snapshot();
    assert_eq!(snapshot.products.len(), 1);
    assert_eq!(snapshot.stats.product_count, 1);
    assert_eq!(snapshot.stats.total_quantity, Decimal::from(24));
    assert_eq!(queue.storage().stats().unwrap().sent, 1);
}

#[tokio::test]
async fn test_duplicate_barcode_conflict_is_verbatim() {
    let backend = SharedBackend::default();
    let base = serve(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let queue = write_queue(&base, QueueStorage::open(dir.path().join("queue.redb")).unwrap());

    queue.create(coca_cola()).await.unwrap();
    let err = queue.create(coca_cola()).await.unwrap_err();

    let SubmitError::Conflict { detail, token } = err else {
        panic!("expected a conflict");
    };
    assert_eq!(
        detail,
        "Product with barcode 5449000000996 already exists for 2025-12"
    );
    let entry = queue.storage().get(token).unwrap().unwrap();
    assert_eq!(entry.status, WriteStatus::Rejected);
    assert_eq!(backend.products.lock().len(), 1);
}

#[tokio::test]
async fn test_offline_create_replayed_after_restart() {
    let backend = SharedBackend::default();
    backend.down.store(true, Ordering::SeqCst);
    let base = serve(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.redb");

    {
        let queue = write_queue(&base, QueueStorage::open(&path).unwrap());
        let outcome = queue.create(coca_cola()).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
        assert!(backend.products.lock().is_empty());
    }

    // Backend is back and the terminal restarts
    backend.down.store(false, Ordering::SeqCst);
    let storage = QueueStorage::open(&path).unwrap();
    assert_eq!(storage.pending().unwrap().len(), 1);

    let queue = write_queue(&base, storage.clone());
    let (_handle, rx) = retry_channel();
    let shutdown = CancellationToken::new();
    let worker = RetryWorker::new(queue.clone(), rx, RetryPolicy::default(), shutdown.clone());
    let task = tokio::spawn(worker.run());

    wait_until(|| storage.pending().map(|p| p.is_empty()).unwrap_or(false)).await;
    shutdown.cancel();
    task.await.unwrap();

    assert_eq!(backend.products.lock().len(), 1);
    assert_eq!(queue.inventory().products().len(), 1);
}

#[tokio::test]
async fn test_lost_response_replay_does_not_duplicate() {
    let backend = SharedBackend::default();
    backend.lose_responses.store(true, Ordering::SeqCst);
    let base = serve(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let queue = write_queue(&base, QueueStorage::open(dir.path().join("queue.redb")).unwrap());

    let outcome = queue.create(coca_cola()).await.unwrap();
    let SubmitOutcome::Queued { token } = outcome else {
        panic!("expected queued");
    };
    assert_eq!(backend.products.lock().len(), 1);

    backend.lose_responses.store(false, Ordering::SeqCst);
    let entry = queue.storage().get(token).unwrap().unwrap();
    queue.replay(&entry).await.unwrap();

    // Same idempotency key: the backend answers with the committed product
    assert_eq!(backend.products.lock().len(), 1);
    assert_eq!(queue.storage().get(token).unwrap().unwrap().status, WriteStatus::Sent);
}

#[tokio::test]
async fn test_update_while_offline_keeps_latest_payload() {
    let backend = SharedBackend::default();
    let base = serve(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let queue = write_queue(&base, QueueStorage::open(dir.path().join("queue.redb")).unwrap());

    let SubmitOutcome::Delivered(saved) = queue.create(coca_cola()).await.unwrap() else {
        panic!("expected delivery");
    };
    let id = saved.id.unwrap();

    backend.down.store(true, Ordering::SeqCst);
    for quantity in [25, 26] {
        let mut edit = saved.clone();
        edit.quantity = Some(Decimal::from(quantity));
        queue.update(id, edit).await.unwrap();
    }

    let pending = queue.storage().pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].product.quantity, Some(Decimal::from(26)));

    backend.down.store(false, Ordering::SeqCst);
    queue.replay(&pending[0]).await.unwrap();
    assert_eq!(
        backend.products.lock()[0].quantity,
        Some(Decimal::from(26))
    );
    assert_eq!(queue.inventory().stats().total_quantity, Decimal::from(26));
}

#[tokio::test]
async fn test_update_of_missing_product_is_refused_not_queued() {
    let backend = SharedBackend::default();
    let base = serve(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let storage = QueueStorage::open(dir.path().join("queue.redb")).unwrap();
    let queue = write_queue(&base, storage.clone());

    let err = queue.update(999, coca_cola()).await.unwrap_err();
    let SubmitError::Conflict { detail, token } = err else {
        panic!("expected refusal");
    };
    assert_eq!(detail, "not found");
    assert_eq!(storage.get(token).unwrap().unwrap().status, WriteStatus::Rejected);
    assert!(storage.pending().unwrap().is_empty());
}
