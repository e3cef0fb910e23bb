//! Retry Worker - replays pending queued writes
//!
//! Stands in for the platform's deferred-execution facility: the write
//! pipeline registers [`RETRY_TASK_TAG`](super::RETRY_TASK_TAG) after a
//! transport failure and this worker replays the queue.
//!
//! - startup: dead letters go back to pending, then every pending entry is
//!   replayed regardless of backoff
//! - registration or periodic scan: due entries are replayed, oldest first
//! - a pass stops at the first transport failure (backend is unreachable)
//! - sent entries older than the retention window are pruned on each scan

use super::{ReplayOutcome, WriteQueue};
use shared::models::QueuedWrite;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Deferred-execution facility as seen by the write pipeline
pub trait RetryScheduler: Send + Sync {
    /// Ask for the named task to run soon
    fn register(&self, tag: &str);
}

/// Channel-backed scheduler feeding a [`RetryWorker`]
#[derive(Debug, Clone)]
pub struct RetryHandle {
    tx: mpsc::UnboundedSender<String>,
}

impl RetryScheduler for RetryHandle {
    fn register(&self, tag: &str) {
        if self.tx.send(tag.to_string()).is_err() {
            tracing::debug!(tag, "Retry worker stopped, registration dropped");
        }
    }
}

pub fn retry_channel() -> (RetryHandle, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RetryHandle { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed attempts before an entry becomes a dead letter
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub scan_interval: Duration,
    pub sent_retention: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            scan_interval: Duration::from_secs(60),
            sent_retention: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: delay = base * 2^retry_count, capped at max
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Epoch millis at which the entry may be replayed again
    pub fn due_at(&self, entry: &QueuedWrite) -> i64 {
        let delay = i64::try_from(self.backoff(entry.retry_count).as_millis()).unwrap_or(i64::MAX);
        entry.updated_at.saturating_add(delay)
    }
}

pub struct RetryWorker {
    queue: Arc<WriteQueue>,
    rx: mpsc::UnboundedReceiver<String>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl RetryWorker {
    pub fn new(
        queue: Arc<WriteQueue>,
        rx: mpsc::UnboundedReceiver<String>,
        policy: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            rx,
            policy,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled
    pub async fn run(mut self) {
        tracing::info!(
            max_retries = self.policy.max_retries,
            scan_interval = ?self.policy.scan_interval,
            "RetryWorker started"
        );

        // Recover dead letter entries back to pending queue
        match self.queue.storage().recover_dead_letters() {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Recovered dead letter entries to pending queue"),
            Err(e) => tracing::error!(error = %e, "Failed to recover dead letter entries"),
        }

        // Replay everything left over from the previous run
        let mut next_due = self.process_pending(true).await;
        self.prune_sent();

        let mut scan_interval = tokio::time::interval(self.policy.scan_interval);
        scan_interval.tick().await; // skip immediate tick
        let mut channel_open = true;

        loop {
            let wake_at = next_due.unwrap_or_else(|| Instant::now() + self.policy.scan_interval);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("RetryWorker shutting down");
                    break;
                }

                tag = self.rx.recv(), if channel_open => {
                    match tag {
                        Some(tag) => {
                            tracing::debug!(tag = %tag, "Retry task registered");
                            next_due = self.process_pending(false).await;
                        }
                        None => {
                            tracing::debug!("Retry channel closed, relying on periodic scan");
                            channel_open = false;
                        }
                    }
                }

                _ = tokio::time::sleep_until(wake_at), if next_due.is_some() => {
                    next_due = self.process_pending(false).await;
                }

                _ = scan_interval.tick() => {
                    next_due = self.process_pending(false).await;
                    self.prune_sent();
                }
            }
        }

        tracing::info!("RetryWorker stopped");
    }

    /// Replay pending entries; returns when the next deferred one is due
    async fn process_pending(&self, force: bool) -> Option<Instant> {
        let pending = match self.queue.storage().pending() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read pending queued writes");
                return None;
            }
        };

        if pending.is_empty() {
            return None;
        }

        tracing::info!(count = pending.len(), force, "Processing pending write queue");

        let now = shared::util::now_millis();
        let mut earliest_due: Option<i64> = None;

        for entry in &pending {
            let due_at = self.policy.due_at(entry);
            if !force && due_at > now {
                earliest_due = Some(earliest_due.map_or(due_at, |e| e.min(due_at)));
                continue;
            }

            match self.queue.replay(entry).await {
                Ok(ReplayOutcome::Delivered) | Ok(ReplayOutcome::Rejected) => {}
                Ok(ReplayOutcome::Failed { retry_count, error }) => {
                    if retry_count >= self.policy.max_retries {
                        tracing::error!(
                            token = entry.token,
                            retry_count,
                            last_error = %error,
                            "Max retry count exceeded, moving to dead letter queue"
                        );
                        if let Err(e) = self.queue.storage().move_to_dead_letter(entry.token, &error) {
                            tracing::error!(token = entry.token, error = %e, "Failed to move entry to dead letter queue");
                        }
                    }
                    // Backend unreachable: the rest of the pass would fail the same way
                    return self.next_due_instant();
                }
                Err(e) => {
                    tracing::error!(token = entry.token, error = %e, "Failed to record replay result");
                    return self.next_due_instant();
                }
            }
        }

        earliest_due.map(millis_to_instant)
    }

    fn next_due_instant(&self) -> Option<Instant> {
        let pending = self.queue.storage().pending().ok()?;
        pending
            .iter()
            .map(|e| self.policy.due_at(e))
            .min()
            .map(millis_to_instant)
    }

    fn prune_sent(&self) {
        match self.queue.storage().prune_sent(self.policy.sent_retention) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(count = n, "Pruned delivered queue entries"),
            Err(e) => tracing::warn!(error = %e, "Failed to prune delivered queue entries"),
        }
    }
}

fn millis_to_instant(due_at: i64) -> Instant {
    let wait = due_at.saturating_sub(shared::util::now_millis()).max(0);
    Instant::now() + Duration::from_millis(wait as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::SharedInventory;
    use crate::queue::testing::{Call, FakeBackend, RecordingScheduler, Reply};
    use crate::queue::{QueueStorage, SubmitOutcome};
    use shared::models::{InventoryMonth, Product, WriteOperation, WriteStatus};

    fn month() -> InventoryMonth {
        InventoryMonth::parse("2025-12").unwrap()
    }

    fn product(name: &str) -> Product {
        let mut product = Product::draft(month());
        product.name = name.to_string();
        product
    }

    fn queue(backend: Arc<FakeBackend>, storage: QueueStorage) -> Arc<WriteQueue> {
        Arc::new(WriteQueue::new(
            storage,
            backend,
            SharedInventory::new(month()),
            Arc::new(RecordingScheduler::default()),
        ))
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            scan_interval: Duration::from_secs(3600),
            sent_retention: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(5));
        assert_eq!(policy.backoff(1), Duration::from_secs(10));
        assert_eq!(policy.backoff(3), Duration::from_secs(40));
        assert_eq!(policy.backoff(10), Duration::from_secs(300));
        assert_eq!(policy.backoff(40), Duration::from_secs(300));
    }

    #[test]
    fn test_due_at_counts_from_last_attempt() {
        let policy = RetryPolicy::default();
        let mut entry = QueuedWrite::new(1, WriteOperation::create(), product("x"), 1_000);
        entry.retry_count = 1;
        entry.updated_at = 50_000;
        assert_eq!(policy.due_at(&entry), 60_000);
    }

    #[test]
    fn test_handle_registers_tag() {
        let (handle, mut rx) = retry_channel();
        handle.register("product-sync");
        assert_eq!(rx.try_recv().unwrap(), "product-sync");

        drop(rx);
        // Closed channel is not an error for the caller
        handle.register("product-sync");
    }

    #[tokio::test]
    async fn test_startup_replays_pending_entries() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let backend = FakeBackend::new(storage.clone());
        let queue = queue(backend.clone(), storage.clone());

        // Recorded by a previous run that never reached the backend
        for name in ["a", "b"] {
            let entry = QueuedWrite::new(
                shared::util::monotonic_token(),
                WriteOperation::create(),
                product(name),
                shared::util::now_millis(),
            );
            storage.append(&entry).unwrap();
        }

        let (_handle, rx) = retry_channel();
        let shutdown = CancellationToken::new();
        let worker = RetryWorker::new(queue, rx, quick_policy(), shutdown.clone());
        let task = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        task.await.unwrap();

        let created: Vec<String> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(created, vec!["a", "b"]);
        assert!(storage.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registration_retries_until_delivered() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let backend = FakeBackend::new(storage.clone());
        backend.script([Reply::Down, Reply::Down]);

        let (handle, rx) = retry_channel();
        let queue = Arc::new(WriteQueue::new(
            storage.clone(),
            backend.clone(),
            SharedInventory::new(month()),
            Arc::new(handle),
        ));

        let shutdown = CancellationToken::new();
        let worker = RetryWorker::new(queue.clone(), rx, quick_policy(), shutdown.clone());
        let task = tokio::spawn(worker.run());

        let outcome = queue.create(product("late")).await.unwrap();
        let SubmitOutcome::Queued { token } = outcome else {
            panic!("expected queued");
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(storage.get(token).unwrap().unwrap().status, WriteStatus::Sent);
        assert_eq!(backend.write_calls(), 3);
        assert_eq!(queue.inventory().products().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_dead_letters() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let backend = FakeBackend::new(storage.clone());
        backend.script([Reply::Down, Reply::Down, Reply::Down]);
        let queue = queue(backend.clone(), storage.clone());

        queue.create(product("doomed")).await.unwrap();

        let worker = RetryWorker::new(
            queue.clone(),
            retry_channel().1,
            quick_policy(),
            CancellationToken::new(),
        );
        // Startup pass counts retry 2, then the due pass counts retry 3
        assert!(worker.process_pending(true).await.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        worker.process_pending(false).await;

        let stats = storage.stats().unwrap();
        assert_eq!(stats.dead_letter, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_recovered_dead_update_does_not_overwrite_newer_edit() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let backend = FakeBackend::new(storage.clone());
        backend.script([Reply::Down]);
        let queue = queue(backend.clone(), storage.clone());

        let SubmitOutcome::Queued { token } = queue.update(7, product("v1")).await.unwrap() else {
            panic!("expected queued");
        };
        storage.move_to_dead_letter(token, "down").unwrap();
        assert!(matches!(
            queue.update(7, product("v2")).await.unwrap(),
            SubmitOutcome::Delivered(_)
        ));

        // Next start
        storage.recover_dead_letters().unwrap();
        let worker = RetryWorker::new(
            queue,
            retry_channel().1,
            quick_policy(),
            CancellationToken::new(),
        );
        worker.process_pending(true).await;

        let updates: Vec<String> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["v1", "v2"]);
        assert_eq!(storage.get(token).unwrap().unwrap().status, WriteStatus::Superseded);
    }

    #[tokio::test]
    async fn test_rejected_replay_is_not_retried() {
        let storage = QueueStorage::open_in_memory().unwrap();
        let backend = FakeBackend::new(storage.clone());
        backend.script([Reply::Down, Reply::Reject("duplicate barcode")]);
        let queue = queue(backend.clone(), storage.clone());

        let SubmitOutcome::Queued { token } = queue.create(product("dup")).await.unwrap() else {
            panic!("expected queued");
        };

        let worker = RetryWorker::new(
            queue,
            retry_channel().1,
            quick_policy(),
            CancellationToken::new(),
        );
        assert_eq!(worker.process_pending(true).await, None);

        let entry = storage.get(token).unwrap().unwrap();
        assert_eq!(entry.status, WriteStatus::Rejected);
        assert_eq!(entry.last_error.as_deref(), Some("duplicate barcode"));
    }
}
