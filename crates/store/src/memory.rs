use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Call, CallJournal};
use tokio::sync::RwLock;

use crate::{
    Entity, EntityId, Result, StoreError, Version, Versioned,
    repository::{Repository, Transaction},
};

type RowKey = (&'static str, EntityId);

#[derive(Debug, Clone)]
struct Row {
    version: Version,
    state: serde_json::Value,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StagedRow {
    expected: Version,
    row: Row,
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_begin: bool,
    fail_on_commit: bool,
    /// Number of saves allowed to succeed before saves start failing.
    save_budget: Option<usize>,
}

/// In-memory repository implementation for testing.
///
/// Writes are staged per transaction and applied atomically on commit after
/// re-checking row versions, which gives the same optimistic concurrency
/// behavior as the PostgreSQL implementation. Failures can be injected at
/// each transaction boundary, and every call can be recorded into a shared
/// [`CallJournal`].
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    rows: Arc<RwLock<HashMap<RowKey, Row>>>,
    faults: Arc<Mutex<Faults>>,
    open: Arc<AtomicUsize>,
    journal: CallJournal,
}

impl InMemoryRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every call into `journal`.
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Returns the journal this repository records into.
    pub fn journal(&self) -> &CallJournal {
        &self.journal
    }

    /// Returns the number of transactions currently open.
    pub fn open_transactions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Returns the number of stored rows.
    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Reads the committed state of an entity without opening a transaction.
    pub async fn get<E: Entity>(&self, id: EntityId) -> Result<Option<Versioned<E>>> {
        let rows = self.rows.read().await;
        rows.get(&(E::entity_type(), id))
            .map(|row| decode(row))
            .transpose()
    }

    /// Deletes the committed row of an entity, returning whether it existed.
    pub async fn remove<E: Entity>(&self, id: EntityId) -> bool {
        self.rows
            .write()
            .await
            .remove(&(E::entity_type(), id))
            .is_some()
    }

    /// Configures `begin` to fail.
    pub fn set_fail_on_begin(&self, fail: bool) {
        self.faults().fail_on_begin = fail;
    }

    /// Configures every save to fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.faults().save_budget = fail.then_some(0);
    }

    /// Lets the next `count` saves succeed and fails every save after them.
    pub fn fail_saves_after(&self, count: usize) {
        self.faults().save_budget = Some(count);
    }

    /// Configures `commit` to fail. Staged writes are discarded.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.faults().fail_on_commit = fail;
    }

    /// Clears all injected failures.
    pub fn clear_faults(&self) {
        *self.faults() = Faults::default();
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode<E: Entity>(row: &Row) -> Result<Versioned<E>> {
    Ok(Versioned {
        entity: serde_json::from_value(row.state.clone())?,
        version: row.version,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl Repository for InMemoryRepository {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        self.journal.record(Call::Begin);
        if self.faults().fail_on_begin {
            return Err(StoreError::Unavailable(
                "injected failure on begin".to_string(),
            ));
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryTransaction {
            repository: self.clone(),
            staged: HashMap::new(),
            finished: false,
        })
    }
}

/// Transaction handle of the [`InMemoryRepository`].
pub struct InMemoryTransaction {
    repository: InMemoryRepository,
    staged: HashMap<RowKey, StagedRow>,
    finished: bool,
}

impl InMemoryTransaction {
    async fn committed_version(&self, key: &RowKey) -> Version {
        self.repository
            .rows
            .read()
            .await
            .get(key)
            .map(|row| row.version)
            .unwrap_or(Version::initial())
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.repository.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn load<E: Entity>(&mut self, id: EntityId) -> Result<Option<Versioned<E>>> {
        self.repository.journal.record(Call::Load);
        let key = (E::entity_type(), id);

        if let Some(staged) = self.staged.get(&key) {
            return decode(&staged.row).map(Some);
        }

        let rows = self.repository.rows.read().await;
        rows.get(&key).map(|row| decode(row)).transpose()
    }

    async fn save<E: Entity>(&mut self, record: &Versioned<E>) -> Result<Version> {
        self.repository.journal.record(Call::Save);
        {
            let mut faults = self.repository.faults();
            match faults.save_budget {
                Some(0) => {
                    return Err(StoreError::Unavailable(
                        "injected failure on save".to_string(),
                    ));
                }
                Some(ref mut remaining) => *remaining -= 1,
                None => {}
            }
        }

        let id = record.id();
        let key = (E::entity_type(), id);

        // An earlier save in this transaction is the baseline for later ones
        let (current, expected) = match self.staged.get(&key) {
            Some(staged) => (staged.row.version, staged.expected),
            None => {
                let current = self.committed_version(&key).await;
                (current, current)
            }
        };

        if record.version != current {
            metrics::counter!("store_concurrency_conflicts_total", "backend" => "memory")
                .increment(1);
            return Err(StoreError::ConcurrencyConflict {
                entity_type: E::entity_type(),
                id,
                expected: record.version,
                actual: current,
            });
        }

        let new_version = current.next();
        self.staged.insert(
            key,
            StagedRow {
                expected,
                row: Row {
                    version: new_version,
                    state: serde_json::to_value(&record.entity)?,
                    updated_at: Utc::now(),
                },
            },
        );

        Ok(new_version)
    }

    async fn commit(mut self) -> Result<()> {
        self.repository.journal.record(Call::Commit);
        self.finish();

        if self.repository.faults().fail_on_commit {
            return Err(StoreError::Unavailable(
                "injected failure on commit".to_string(),
            ));
        }

        let staged = std::mem::take(&mut self.staged);
        let mut rows = self.repository.rows.write().await;

        // Re-validate every staged row under the write lock before applying any
        for ((entity_type, id), staged_row) in &staged {
            let actual = rows
                .get(&(*entity_type, *id))
                .map(|row| row.version)
                .unwrap_or(Version::initial());
            if actual != staged_row.expected {
                metrics::counter!("store_concurrency_conflicts_total", "backend" => "memory")
                    .increment(1);
                return Err(StoreError::ConcurrencyConflict {
                    entity_type: *entity_type,
                    id: *id,
                    expected: staged_row.expected,
                    actual,
                });
            }
        }

        for (key, staged_row) in staged {
            rows.insert(key, staged_row.row);
        }

        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.repository.journal.record(Call::Rollback);
        self.staged.clear();
        self.finish();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("in-memory transaction dropped without commit, rolling back");
            self.repository.journal.record(Call::Rollback);
            self.finish();
        }
    }
}
