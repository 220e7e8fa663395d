//! Caller-supplied compensation hook.

use async_trait::async_trait;
use common::{EntityId, UpdateId};
use domain::{DomainError, UpdatePayload};
use thiserror::Error;

/// What a compensation hook knows about the failed update.
#[derive(Debug, Clone)]
pub struct CompensationContext {
    /// Correlation ID of the failed update.
    pub update_id: UpdateId,

    /// The entity whose step 1 change remains committed.
    pub entity_id: EntityId,

    /// The payload step 1 applied.
    pub payload: UpdatePayload,

    /// Description of the step 2 failure.
    pub reason: String,
}

/// Error returned by a compensation hook.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CompensationError {
    pub message: String,
}

impl CompensationError {
    /// Creates a compensation error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DomainError> for CompensationError {
    fn from(e: DomainError) -> Self {
        Self::new(e.to_string())
    }
}

/// Corrective action run after transaction B fails.
///
/// The hook runs with no transaction held by the coordinator; it opens its
/// own if it needs one. It is best-effort: its failure is reported alongside
/// the original error and never replaces it.
#[async_trait]
pub trait Compensation: Send + Sync {
    /// Attempts to reverse or flag the effect of step 1.
    async fn compensate(&self, ctx: &CompensationContext) -> Result<(), CompensationError>;
}
