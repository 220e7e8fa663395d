//! User service providing short-transaction operations on users.

use common::EntityId;
use store::{Repository, RepositoryExt, StoreError, Transaction, Versioned};

use crate::error::DomainError;

use super::User;

/// Service for creating, reading and flagging users.
///
/// Every operation runs in its own transaction and commits before returning.
pub struct UserService<R: Repository> {
    repository: R,
}

impl<R: Repository> UserService<R> {
    /// Creates a new user service backed by `repository`.
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Creates and stores a new user.
    #[tracing::instrument(skip(self, display_name, email))]
    pub async fn create_user(
        &self,
        id: EntityId,
        display_name: &str,
        email: &str,
    ) -> Result<User, DomainError> {
        let user = User::new(id, display_name, email)?;

        match self.repository.insert(user.clone()).await {
            Ok(_) => {
                tracing::info!(user_id = %id, "user created");
                Ok(user)
            }
            Err(StoreError::ConcurrencyConflict { .. }) => Err(DomainError::UserAlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads a user with its row metadata.
    ///
    /// Returns None if the user doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, id: EntityId) -> Result<Option<Versioned<User>>, DomainError> {
        Ok(self.repository.read::<User>(id).await?)
    }

    /// Marks a user's sync as failed, in its own transaction.
    #[tracing::instrument(skip(self, reason))]
    pub async fn flag_sync_failure(&self, id: EntityId, reason: &str) -> Result<(), DomainError> {
        let mut tx = self.repository.begin().await?;

        let Some(mut record) = tx.load::<User>(id).await? else {
            tx.rollback().await?;
            return Err(DomainError::UserNotFound(id));
        };

        record.entity.mark_sync_failed(reason);
        tx.save(&record).await?;
        tx.commit().await?;

        tracing::warn!(user_id = %id, reason, "user sync flagged as failed");
        Ok(())
    }
}
