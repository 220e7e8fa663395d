//! Compensation installed by the API server.

use async_trait::async_trait;
use coordinator::{Compensation, CompensationContext, CompensationError};
use domain::UserService;
use store::Repository;

/// Flags the user's sync as failed when the second step of an update fails.
///
/// The profile change from step 1 stays committed; the flag makes the
/// unfinished sync visible to readers and operators.
pub struct FlagSyncFailure<R: Repository> {
    users: UserService<R>,
}

impl<R: Repository> FlagSyncFailure<R> {
    pub fn new(repository: R) -> Self {
        Self {
            users: UserService::new(repository),
        }
    }
}

#[async_trait]
impl<R: Repository + 'static> Compensation for FlagSyncFailure<R> {
    async fn compensate(&self, ctx: &CompensationContext) -> Result<(), CompensationError> {
        tracing::info!(
            update_id = %ctx.update_id,
            user_id = %ctx.entity_id,
            "flagging user sync as failed"
        );
        self.users
            .flag_sync_failure(ctx.entity_id, &ctx.reason)
            .await?;
        Ok(())
    }
}
