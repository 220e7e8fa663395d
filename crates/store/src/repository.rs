use async_trait::async_trait;

use crate::{Entity, EntityId, Result, Version, Versioned};

/// Core trait for transactional storage.
///
/// A repository hands out transactions; all reads and writes go through a
/// transaction. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Repository: Send + Sync {
    /// The transaction handle produced by [`Repository::begin`].
    type Transaction: Transaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;
}

/// An open transaction.
///
/// The handle is consumed by [`Transaction::commit`] or
/// [`Transaction::rollback`]. Dropping it without either rolls it back, so a
/// transaction is released on every exit path.
#[async_trait]
pub trait Transaction: Send {
    /// Loads an entity, returning None if no row exists.
    ///
    /// Writes staged earlier in the same transaction are visible.
    async fn load<E: Entity>(&mut self, id: EntityId) -> Result<Option<Versioned<E>>>;

    /// Stages a write of the record.
    ///
    /// The write succeeds only if the stored row is still at
    /// `record.version` (or absent, for a new record). Returns the version the
    /// row will have once committed.
    async fn save<E: Entity>(&mut self, record: &Versioned<E>) -> Result<Version>;

    /// Commits all staged writes atomically.
    async fn commit(self) -> Result<()>;

    /// Discards all staged writes.
    async fn rollback(self) -> Result<()>;
}

/// Extension trait providing single-transaction conveniences.
#[async_trait]
pub trait RepositoryExt: Repository {
    /// Loads an entity in its own short read transaction.
    async fn read<E: Entity>(&self, id: EntityId) -> Result<Option<Versioned<E>>> {
        let mut tx = self.begin().await?;
        let record = tx.load(id).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Inserts a new entity in its own transaction.
    ///
    /// Fails with `ConcurrencyConflict` if the entity already exists.
    async fn insert<E: Entity>(&self, entity: E) -> Result<Version> {
        let mut tx = self.begin().await?;
        let version = tx.save(&Versioned::new(entity)).await?;
        tx.commit().await?;
        Ok(version)
    }
}

// Blanket implementation for all Repository implementations
impl<T: Repository + ?Sized> RepositoryExt for T {}
