use thiserror::Error;

use crate::{EntityId, Version};

/// Errors that can occur when interacting with a repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row changed since it was loaded.
    /// The expected version did not match the stored version.
    #[error(
        "Concurrency conflict for {entity_type} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        entity_type: &'static str,
        id: EntityId,
        expected: Version,
        actual: Version,
    },

    /// The backing store refused or failed the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if repeating the whole transaction may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::ConcurrencyConflict { .. } | StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            StoreError::Migration(_) | StoreError::Serialization(_) => false,
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_transient() {
        let err = StoreError::ConcurrencyConflict {
            entity_type: "User",
            id: EntityId::new(1),
            expected: Version::new(2),
            actual: Version::new(3),
        };
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Concurrency conflict for User 1: expected version 2, found 3"
        );
    }

    #[test]
    fn serialization_errors_are_permanent() {
        let err = StoreError::from(serde_json::from_str::<i64>("nope").unwrap_err());
        assert!(!err.is_transient());
    }
}
