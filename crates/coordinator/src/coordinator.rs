//! Update coordinator for two-phase entity updates.

use std::sync::Arc;
use std::time::Instant;

use common::EntityId;
use domain::{ExternalResult, UpdatePayload, User};
use store::{Repository, Transaction};

use crate::compensation::{Compensation, CompensationContext};
use crate::error::{StepFailure, UpdateError};
use crate::external::{ExternalCallError, ExternalClient};
use crate::retry::RetryPolicy;
use crate::state::{FailedStep, UpdateState, UpdateTracker};

/// Orchestrates two-phase updates of a user.
///
/// Each update runs transaction A (apply the payload), then the external call
/// with no transaction open, then transaction B (apply the external result).
/// Every transaction is committed or rolled back before the next phase
/// begins, so no connection or row is held while the external call runs.
pub struct UpdateCoordinator<R, X>
where
    R: Repository,
    X: ExternalClient,
{
    repository: R,
    external: X,
    compensation: Option<Arc<dyn Compensation>>,
}

impl<R, X> UpdateCoordinator<R, X>
where
    R: Repository,
    X: ExternalClient,
{
    /// Creates a new coordinator without compensation.
    pub fn new(repository: R, external: X) -> Self {
        Self {
            repository,
            external,
            compensation: None,
        }
    }

    /// Installs a hook that runs when transaction B fails.
    pub fn with_compensation(mut self, compensation: Arc<dyn Compensation>) -> Self {
        self.compensation = Some(compensation);
        self
    }

    /// Returns a reference to the repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Returns a reference to the external client.
    pub fn external(&self) -> &X {
        &self.external
    }

    /// Updates the user `id` with `payload`, then with the external result.
    ///
    /// See [`UpdateError`] for which failures leave step 1 committed.
    #[tracing::instrument(skip(self, payload), fields(update_id = tracing::field::Empty))]
    pub async fn update_entity(
        &self,
        id: EntityId,
        payload: &UpdatePayload,
    ) -> Result<(), UpdateError> {
        metrics::counter!("entity_updates_total").increment(1);
        let started = Instant::now();

        let mut tracker = UpdateTracker::new(id);
        tracing::Span::current().record("update_id", tracing::field::display(tracker.update_id()));

        let result = self.run(&mut tracker, id, payload).await;

        let outcome = match &result {
            Ok(()) => "success",
            Err(e) => e.kind(),
        };
        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("entity_update_duration_seconds").record(duration);
        metrics::counter!("entity_update_outcomes_total", "outcome" => outcome).increment(1);

        match &result {
            Ok(()) => tracing::info!(%id, duration, "update completed"),
            Err(e) if e.is_partial() => tracing::warn!(
                %id,
                state = %tracker.state(),
                error = %e,
                "update left step 1 committed"
            ),
            Err(e) => tracing::info!(%id, error = %e, "update rejected, nothing committed"),
        }

        result
    }

    /// Runs [`update_entity`](Self::update_entity), repeating it while
    /// `policy` allows.
    pub async fn update_with_retry(
        &self,
        id: EntityId,
        payload: &UpdatePayload,
        policy: &RetryPolicy,
    ) -> Result<(), UpdateError> {
        let mut attempt = 1;
        loop {
            match self.update_entity(id, payload).await {
                Err(e) if policy.should_retry(&e, attempt) => {
                    let delay = policy.backoff(attempt);
                    tracing::info!(%id, attempt, ?delay, error = %e, "retrying update");
                    metrics::counter!("entity_update_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn run(
        &self,
        tracker: &mut UpdateTracker,
        id: EntityId,
        payload: &UpdatePayload,
    ) -> Result<(), UpdateError> {
        // Step 1: transaction A
        tracing::info!(step = "step1", "update step started");
        let committed = match self
            .transact(tracker, UpdateState::TxAOpen, id, |user| {
                Ok(user.apply_change(payload)?)
            })
            .await
        {
            Ok(committed) => committed,
            Err(failure) => {
                tracker.advance(UpdateState::Failed(FailedStep::Step1));
                return Err(match failure {
                    StepFailure::Missing(id) => UpdateError::NotFound(id),
                    other => UpdateError::Step1Failed(other),
                });
            }
        };
        tracker.advance(UpdateState::TxACommitted);
        let revision = committed.revision();

        // External call with no transaction open
        tracker.advance(UpdateState::ExternalInFlight);
        let result = match self.call_external(payload).await {
            Ok(result) => result,
            Err(e) => {
                tracker.advance(UpdateState::Failed(FailedStep::ExternalCall));
                return Err(UpdateError::ExternalCallFailed(e));
            }
        };

        // Step 2: transaction B, on a fresh read that must still carry step 1's revision
        tracing::info!(step = "step2", "update step started");
        match self
            .transact(tracker, UpdateState::TxBOpen, id, |user| {
                if user.revision() != revision {
                    return Err(StepFailure::Superseded {
                        expected: revision,
                        actual: user.revision(),
                    });
                }
                Ok(user.apply_result(&result)?)
            })
            .await
        {
            Ok(_) => {
                tracker.advance(UpdateState::TxBCommitted);
                Ok(())
            }
            Err(failure) => {
                tracker.advance(UpdateState::Failed(FailedStep::Step2));
                Err(self.compensate(tracker, id, payload, failure).await)
            }
        }
    }

    /// Runs one transaction: load, mutate, save, commit.
    ///
    /// Returns the user as committed. The transaction is rolled back on any
    /// failure before this returns, and the loaded entity is dropped with it.
    async fn transact<F>(
        &self,
        tracker: &mut UpdateTracker,
        opened: UpdateState,
        id: EntityId,
        mutate: F,
    ) -> Result<User, StepFailure>
    where
        F: FnOnce(&mut User) -> Result<(), StepFailure> + Send,
    {
        let mut tx = self.repository.begin().await?;
        tracker.advance(opened);

        match Self::stage(&mut tx, id, mutate).await {
            Ok(user) => {
                tx.commit().await?;
                Ok(user)
            }
            Err(failure) => {
                if let Err(e) = tx.rollback().await {
                    tracing::warn!(%id, error = %e, "rollback failed");
                }
                Err(failure)
            }
        }
    }

    async fn stage<F>(tx: &mut R::Transaction, id: EntityId, mutate: F) -> Result<User, StepFailure>
    where
        F: FnOnce(&mut User) -> Result<(), StepFailure> + Send,
    {
        let mut record = tx
            .load::<User>(id)
            .await?
            .ok_or(StepFailure::Missing(id))?;
        mutate(&mut record.entity)?;
        tx.save(&record).await?;
        Ok(record.into_inner())
    }

    async fn call_external(
        &self,
        payload: &UpdatePayload,
    ) -> Result<ExternalResult, ExternalCallError> {
        let started = Instant::now();
        let result = self.external.call(payload).await;
        metrics::histogram!("external_call_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if let Err(ref e) = result {
            tracing::warn!(error = %e, "external call failed");
        }
        result
    }

    /// Runs the compensation hook, if any, after transaction B was rolled back.
    async fn compensate(
        &self,
        tracker: &UpdateTracker,
        id: EntityId,
        payload: &UpdatePayload,
        failure: StepFailure,
    ) -> UpdateError {
        let Some(ref hook) = self.compensation else {
            return UpdateError::Step2Failed {
                source: failure,
                compensated: false,
            };
        };

        let ctx = CompensationContext {
            update_id: tracker.update_id(),
            entity_id: id,
            payload: payload.clone(),
            reason: failure.to_string(),
        };

        match hook.compensate(&ctx).await {
            Ok(()) => {
                metrics::counter!("compensations_total", "result" => "ok").increment(1);
                tracing::info!(%id, "compensation completed");
                UpdateError::Step2Failed {
                    source: failure,
                    compensated: true,
                }
            }
            Err(error) => {
                metrics::counter!("compensations_total", "result" => "failed").increment(1);
                tracing::error!(%id, %error, "compensation failed, manual intervention required");
                UpdateError::CompensationFailed {
                    original: Box::new(UpdateError::Step2Failed {
                        source: failure,
                        compensated: false,
                    }),
                    error,
                }
            }
        }
    }
}
