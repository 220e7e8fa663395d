//! Update error types.

use common::EntityId;
use domain::UserError;
use store::StoreError;
use thiserror::Error;

use crate::compensation::CompensationError;
use crate::external::ExternalCallError;

/// Why a transactional step did not commit.
#[derive(Debug, Error)]
pub enum StepFailure {
    /// The repository failed to begin, load, save or commit.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The mutation rejected the current state or input.
    #[error("Mutation rejected: {0}")]
    Rejected(#[from] UserError),

    /// The entity no longer exists.
    #[error("Entity {0} does not exist")]
    Missing(EntityId),

    /// Another update changed the entity after step 1 committed.
    #[error("Step 1 revision {expected} was superseded by revision {actual}")]
    Superseded { expected: u64, actual: u64 },
}

impl StepFailure {
    /// Returns true if running the step again may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StepFailure::Store(e) => e.is_transient(),
            StepFailure::Rejected(_)
            | StepFailure::Missing(_)
            | StepFailure::Superseded { .. } => false,
        }
    }
}

/// Errors returned by [`UpdateCoordinator::update_entity`].
///
/// The kinds distinguish "nothing happened" (`NotFound`, `Step1Failed`) from
/// "the first half happened" (`ExternalCallFailed`, `Step2Failed`,
/// `CompensationFailed`).
///
/// [`UpdateCoordinator::update_entity`]: crate::UpdateCoordinator::update_entity
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The entity does not exist. Nothing was changed.
    #[error("Entity not found: {0}")]
    NotFound(EntityId),

    /// Transaction A was rolled back. Nothing was changed and no external
    /// call was made.
    #[error("Step 1 failed and was rolled back: {0}")]
    Step1Failed(#[source] StepFailure),

    /// The external call failed. Step 1 remains committed and transaction B
    /// was never opened.
    #[error("External call failed after step 1 committed: {0}")]
    ExternalCallFailed(#[source] ExternalCallError),

    /// Transaction B was rolled back. Step 1 remains committed.
    #[error("Step 2 failed and was rolled back after step 1 committed (compensated: {compensated}): {source}")]
    Step2Failed {
        source: StepFailure,
        compensated: bool,
    },

    /// Compensation after a partial failure did not succeed; the entity
    /// needs manual intervention.
    #[error("Compensation failed ({error}) after: {original}")]
    CompensationFailed {
        #[source]
        original: Box<UpdateError>,
        error: CompensationError,
    },
}

impl UpdateError {
    /// Returns true if step 1's change remains committed.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            UpdateError::ExternalCallFailed(_)
                | UpdateError::Step2Failed { .. }
                | UpdateError::CompensationFailed { .. }
        )
    }

    /// Returns true if the whole update can be attempted again as if it were
    /// the first attempt.
    ///
    /// Only `Step1Failed` with a transient cause qualifies; partial outcomes
    /// are never retryable here.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpdateError::Step1Failed(failure) => failure.is_transient(),
            _ => false,
        }
    }

    /// Returns true if an operator needs to reconcile the entity.
    pub fn requires_manual_intervention(&self) -> bool {
        matches!(self, UpdateError::CompensationFailed { .. })
    }

    /// Returns a short label for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateError::NotFound(_) => "not_found",
            UpdateError::Step1Failed(_) => "step1_failed",
            UpdateError::ExternalCallFailed(_) => "external_call_failed",
            UpdateError::Step2Failed { .. } => "step2_failed",
            UpdateError::CompensationFailed { .. } => "compensation_failed",
        }
    }
}

/// Convenience type alias for update results.
pub type Result<T> = std::result::Result<T, UpdateError>;
