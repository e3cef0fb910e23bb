use shared::models::InventoryMonth;
use std::sync::Arc;
use stockroom_client::{CatalogClient, CatalogSource, InventoryBackend, InventoryClient};
use stockroom_terminal::scan::shared_device;
use stockroom_terminal::{
    BarcodeResolver, CategoryStore, CountOutcome, KeyboardWedge, PriceCache, QueueStorage,
    ResolverResult, RetryWorker, ScanConfig, ScanSession, SharedInventory, SubmitError,
    SubmitOutcome, WriteQueue, count_scan, retry_channel, setup_environment,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 工作目录, 日志)
    let config = setup_environment()?;
    tracing::info!(
        work_dir = %config.work_dir.display(),
        backend = %config.backend_url,
        quick_count = config.quick_count,
        "Stockroom terminal starting"
    );

    // 2. 离线写入队列存储
    let storage = QueueStorage::open(config.queue_db_path())?;

    // 3. 后端与商品目录客户端
    let backend: Arc<dyn InventoryBackend> =
        Arc::new(InventoryClient::new(&config.backend_client_config())?);
    let catalog: Arc<dyn CatalogSource> =
        Arc::new(CatalogClient::new(&config.catalog_client_config())?);
    let price_cache = Arc::new(PriceCache::load(&config.price_cache_path));
    let categories = CategoryStore::new(config.tenant_id.clone());

    // 4. 写入队列 + 重试 worker
    let inventory = SharedInventory::new(InventoryMonth::current());
    let (retry_handle, retry_rx) = retry_channel();
    let queue = Arc::new(WriteQueue::new(
        storage,
        backend,
        inventory.clone(),
        Arc::new(retry_handle),
    ));
    if let Err(e) = queue.refresh_inventory().await {
        tracing::warn!(error = %e, "Initial inventory load failed, continuing offline");
    }

    let shutdown = CancellationToken::new();
    let worker = RetryWorker::new(queue.clone(), retry_rx, config.retry_policy(), shutdown.clone());
    let worker_handle = tokio::spawn(worker.run());

    // 5. 扫码会话 (键盘模式扫码枪 → stdin)
    let resolver = Arc::new(BarcodeResolver::new(price_cache, catalog));
    let wedge = KeyboardWedge::new(tokio::io::stdin());
    let input_closed = wedge.eof_token();
    let mut session = ScanSession::new(
        shared_device(wedge),
        resolver,
        inventory.clone(),
        ScanConfig::default(),
    );
    let scanning = match session.start() {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start scanning");
            false
        }
    };

    if scanning {
        loop {
            tokio::select! {
                biased;

                event = session.next_event() => {
                    // 跨月运行: 切换到新的盘点月份
                    if inventory.advance_to(InventoryMonth::current()) {
                        if let Err(e) = queue.refresh_inventory().await {
                            tracing::warn!(error = %e, "Inventory load for new month failed");
                        }
                    }

                    if let Some(result) = session.handle_event(event).await {
                        let submitted = if config.quick_count {
                            Some(quick_count(&queue, &result).await)
                        } else {
                            None
                        };
                        if let Err(e) = print_result(&result, &categories, submitted) {
                            tracing::error!(error = %e, "Failed to print scan result");
                        }
                        if let Err(e) = session.start() {
                            tracing::error!(error = %e, "Failed to restart scanning");
                            break;
                        }
                    }
                }
                _ = input_closed.cancelled() => {
                    tracing::info!("Scanner input closed");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted");
                    break;
                }
            }
        }
    }

    session.stop();
    shutdown.cancel();
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "Retry worker task failed");
    }

    tracing::info!("Stockroom terminal stopped");
    Ok(())
}

/// 快速盘点结果 → JSON
async fn quick_count(queue: &WriteQueue, result: &ResolverResult) -> serde_json::Value {
    match count_scan(queue, result).await {
        CountOutcome::Skipped(reason) => skipped(reason),
        CountOutcome::Submitted(Ok(SubmitOutcome::Delivered(product))) => {
            serde_json::json!({ "status": "delivered", "product_id": product.id })
        }
        CountOutcome::Submitted(Ok(SubmitOutcome::Queued { token })) => {
            serde_json::json!({ "status": "queued", "token": token })
        }
        CountOutcome::Submitted(Err(SubmitError::Conflict { detail, token })) => {
            serde_json::json!({ "status": "rejected", "detail": detail, "token": token })
        }
        CountOutcome::Submitted(Err(SubmitError::Unauthorized { detail, token })) => {
            serde_json::json!({ "status": "unauthorized", "detail": detail, "token": token })
        }
        CountOutcome::Submitted(Err(e @ SubmitError::Storage(_))) => {
            tracing::error!(error = %e, "Quick count lost");
            serde_json::json!({ "status": "failed", "detail": e.to_string() })
        }
    }
}

fn skipped(reason: &str) -> serde_json::Value {
    serde_json::json!({ "status": "skipped", "detail": reason })
}

fn print_result(
    result: &ResolverResult,
    categories: &CategoryStore,
    submitted: Option<serde_json::Value>,
) -> anyhow::Result<()> {
    let product = result.product();
    let line = serde_json::json!({
        "match": if result.is_existing() { "existing" } else { "draft" },
        "category_label": categories.get(product.category.as_str()).map(|c| c.label.as_str()),
        "product": product,
        "submission": submitted,
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}
