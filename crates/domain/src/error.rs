//! Domain error types.

use common::EntityId;
use store::StoreError;
use thiserror::Error;

use crate::user::UserError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the repository.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A user invariant was violated.
    #[error("User error: {0}")]
    User(#[from] UserError),

    /// User not found.
    #[error("User not found: {0}")]
    UserNotFound(EntityId),

    /// A user with this ID already exists.
    #[error("User already exists: {0}")]
    UserAlreadyExists(EntityId),
}
