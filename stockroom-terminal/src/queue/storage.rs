//! redb-based storage for the offline write queue
//!
//! Every create/update is appended here before any network attempt, so a
//! crash or an unreachable backend never loses a mutation.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::models::{Barcode, InventoryMonth, Product, QueuedWrite, WriteOperation, WriteStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Queued writes table: key = token, value = JSON QueuedWrite
const QUEUED_WRITES_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("queued_writes");

/// Index: product id -> token of its latest still-pending update
const PENDING_UPDATES_TABLE: TableDefinition<i64, i64> = TableDefinition::new("pending_updates");

/// Index: product id -> token of its newest update, whatever its status
const LATEST_UPDATES_TABLE: TableDefinition<i64, i64> = TableDefinition::new("latest_updates");

#[derive(Debug, Error)]
pub enum QueueStorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queued write not found: {0}")]
    NotFound(i64),

    #[error("Queued write {0} is no longer pending")]
    NotPending(i64),
}

pub type StorageResult<T> = Result<T, QueueStorageError>;

/// Entry counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub sent: u64,
    pub rejected: u64,
    pub superseded: u64,
    pub dead_letter: u64,
}

/// Offline write queue storage
#[derive(Clone)]
pub struct QueueStorage {
    db: Arc<Database>,
}

impl QueueStorage {
    /// Open or create database
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db =
            Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(QUEUED_WRITES_TABLE)?;
            let _ = write_txn.open_table(PENDING_UPDATES_TABLE)?;
            let _ = write_txn.open_table(LATEST_UPDATES_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Append a new entry
    ///
    /// An update supersedes the still-pending update of the same product;
    /// the superseded token is returned.
    pub fn append(&self, entry: &QueuedWrite) -> StorageResult<Option<i64>> {
        let txn = self.db.begin_write()?;
        let superseded = {
            let mut table = txn.open_table(QUEUED_WRITES_TABLE)?;
            let mut index = txn.open_table(PENDING_UPDATES_TABLE)?;
            let mut latest = txn.open_table(LATEST_UPDATES_TABLE)?;

            let mut superseded = None;
            if let WriteOperation::Update { id } = entry.operation {
                let previous = index.get(id)?.map(|guard| guard.value());
                if let Some(previous) = previous {
                    let old = read_entry(&table, previous)?;
                    if let Some(mut old) = old.filter(QueuedWrite::is_pending) {
                        old.status = WriteStatus::Superseded;
                        old.updated_at = entry.created_at;
                        write_entry(&mut table, &old)?;
                        superseded = Some(previous);
                    }
                }
                index.insert(id, entry.token)?;

                let newest = latest.get(id)?.map(|guard| guard.value());
                if newest.is_none_or(|newest| newest < entry.token) {
                    latest.insert(id, entry.token)?;
                }
            }

            write_entry(&mut table, entry)?;
            superseded
        };
        txn.commit()?;

        if let Some(old) = superseded {
            tracing::debug!(token = entry.token, superseded = old, "Pending update superseded");
        }
        Ok(superseded)
    }

    pub fn get(&self, token: i64) -> StorageResult<Option<QueuedWrite>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(QUEUED_WRITES_TABLE)?;
        read_entry(&table, token)
    }

    /// Pending entries, oldest token first
    pub fn pending(&self) -> StorageResult<Vec<QueuedWrite>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(QueuedWrite::is_pending)
            .collect())
    }

    /// Still-pending update of a product
    pub fn pending_update(&self, id: i64) -> StorageResult<Option<QueuedWrite>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PENDING_UPDATES_TABLE)?;
        let Some(token) = index.get(id)?.map(|guard| guard.value()) else {
            return Ok(None);
        };
        let table = read_txn.open_table(QUEUED_WRITES_TABLE)?;
        Ok(read_entry(&table, token)?.filter(QueuedWrite::is_pending))
    }

    /// Newest still-pending create for the (barcode, month) slot
    pub fn pending_create(
        &self,
        barcode: &Barcode,
        month: &InventoryMonth,
    ) -> StorageResult<Option<QueuedWrite>> {
        Ok(self.pending()?.into_iter().rev().find(|entry| {
            matches!(entry.operation, WriteOperation::Create { .. })
                && entry.product.occupies(barcode, month)
        }))
    }

    /// Replace the payload of a still-pending entry, keeping its token and
    /// idempotency key
    pub fn amend_pending(&self, token: i64, product: Product) -> StorageResult<QueuedWrite> {
        let txn = self.db.begin_write()?;
        let entry = {
            let mut table = txn.open_table(QUEUED_WRITES_TABLE)?;
            let mut entry = read_entry(&table, token)?.ok_or(QueueStorageError::NotFound(token))?;
            if !entry.is_pending() {
                return Err(QueueStorageError::NotPending(token));
            }

            entry.product = product;
            entry.updated_at = shared::util::now_millis();
            write_entry(&mut table, &entry)?;
            entry
        };
        txn.commit()?;
        Ok(entry)
    }

    /// All entries, oldest token first
    pub fn entries(&self) -> StorageResult<Vec<QueuedWrite>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(QUEUED_WRITES_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let entry: QueuedWrite = serde_json::from_slice(value.value())?;
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn mark_sent(&self, token: i64) -> StorageResult<QueuedWrite> {
        self.update(token, |entry| {
            entry.status = WriteStatus::Sent;
            entry.last_error = None;
        })
    }

    /// Record a failed delivery attempt, keeping the entry pending
    pub fn mark_failed(&self, token: i64, error: &str) -> StorageResult<QueuedWrite> {
        self.update(token, |entry| {
            entry.retry_count += 1;
            entry.last_error = Some(error.to_string());
        })
    }

    /// Record a backend validation refusal; the entry is never replayed
    pub fn mark_rejected(&self, token: i64, detail: &str) -> StorageResult<QueuedWrite> {
        self.update(token, |entry| {
            entry.status = WriteStatus::Rejected;
            entry.last_error = Some(detail.to_string());
        })
    }

    pub fn move_to_dead_letter(&self, token: i64, error: &str) -> StorageResult<QueuedWrite> {
        self.update(token, |entry| {
            entry.status = WriteStatus::DeadLetter;
            entry.last_error = Some(error.to_string());
        })
    }

    /// Move all dead letters back to pending (reset retry count)
    ///
    /// A dead update whose product has since received a newer update is
    /// superseded instead, even when that update was already delivered.
    pub fn recover_dead_letters(&self) -> StorageResult<usize> {
        let txn = self.db.begin_write()?;
        let count = {
            let mut table = txn.open_table(QUEUED_WRITES_TABLE)?;
            let mut index = txn.open_table(PENDING_UPDATES_TABLE)?;
            let latest = txn.open_table(LATEST_UPDATES_TABLE)?;

            // Collect first (can't iterate and mutate simultaneously)
            let mut dead = Vec::new();
            for result in table.iter()? {
                let (_key, value) = result?;
                let entry: QueuedWrite = serde_json::from_slice(value.value())?;
                if entry.status == WriteStatus::DeadLetter {
                    dead.push(entry);
                }
            }

            let now = shared::util::now_millis();
            let mut recovered = 0;
            for mut entry in dead {
                entry.updated_at = now;
                entry.status = WriteStatus::Pending;
                entry.retry_count = 0;

                if let WriteOperation::Update { id } = entry.operation {
                    let newest = latest.get(id)?.map(|guard| guard.value());
                    if newest.is_some_and(|newest| newest > entry.token) {
                        entry.status = WriteStatus::Superseded;
                    } else {
                        index.insert(id, entry.token)?;
                    }
                }

                if entry.is_pending() {
                    recovered += 1;
                }
                write_entry(&mut table, &entry)?;
            }
            recovered
        };
        txn.commit()?;
        Ok(count)
    }

    /// Remove sent entries last touched longer ago than `max_age`
    pub fn prune_sent(&self, max_age: Duration) -> StorageResult<usize> {
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = shared::util::now_millis().saturating_sub(max_age_ms);
        self.prune_sent_before(cutoff)
    }

    fn prune_sent_before(&self, cutoff: i64) -> StorageResult<usize> {
        let txn = self.db.begin_write()?;
        let deleted = {
            let mut table = txn.open_table(QUEUED_WRITES_TABLE)?;

            let mut to_delete = Vec::new();
            for result in table.iter()? {
                let (key, value) = result?;
                let entry: QueuedWrite = serde_json::from_slice(value.value())?;
                if entry.status == WriteStatus::Sent && entry.updated_at < cutoff {
                    to_delete.push(key.value());
                }
            }

            for token in &to_delete {
                table.remove(*token)?;
            }
            to_delete.len()
        };
        txn.commit()?;
        Ok(deleted)
    }

    pub fn stats(&self) -> StorageResult<QueueStats> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(QUEUED_WRITES_TABLE)?;

        let mut stats = QueueStats {
            total: table.len()?,
            ..Default::default()
        };
        for result in table.iter()? {
            let (_key, value) = result?;
            let entry: QueuedWrite = serde_json::from_slice(value.value())?;
            match entry.status {
                WriteStatus::Pending => stats.pending += 1,
                WriteStatus::Sent => stats.sent += 1,
                WriteStatus::Rejected => stats.rejected += 1,
                WriteStatus::Superseded => stats.superseded += 1,
                WriteStatus::DeadLetter => stats.dead_letter += 1,
            }
        }
        Ok(stats)
    }

    /// Read-modify-write one entry; drops it from the update index once it
    /// leaves `Pending`
    fn update(
        &self,
        token: i64,
        apply: impl FnOnce(&mut QueuedWrite),
    ) -> StorageResult<QueuedWrite> {
        let txn = self.db.begin_write()?;
        let entry = {
            let mut table = txn.open_table(QUEUED_WRITES_TABLE)?;
            let mut entry = read_entry(&table, token)?.ok_or(QueueStorageError::NotFound(token))?;

            apply(&mut entry);
            entry.updated_at = shared::util::now_millis();
            write_entry(&mut table, &entry)?;

            if !entry.is_pending() {
                unindex(&txn, &entry)?;
            }
            entry
        };
        txn.commit()?;
        Ok(entry)
    }
}

fn read_entry(
    table: &impl ReadableTable<i64, &'static [u8]>,
    token: i64,
) -> StorageResult<Option<QueuedWrite>> {
    match table.get(token)? {
        Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
        None => Ok(None),
    }
}

fn write_entry(table: &mut redb::Table<i64, &'static [u8]>, entry: &QueuedWrite) -> StorageResult<()> {
    let value = serde_json::to_vec(entry)?;
    table.insert(entry.token, value.as_slice())?;
    Ok(())
}

fn unindex(txn: &WriteTransaction, entry: &QueuedWrite) -> StorageResult<()> {
    if let WriteOperation::Update { id } = entry.operation {
        let mut index = txn.open_table(PENDING_UPDATES_TABLE)?;
        let current = index.get(id)?.map(|guard| guard.value());
        if current == Some(entry.token) {
            index.remove(id)?;
        }
    }
    Ok(())
}
