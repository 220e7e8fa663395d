//! Two-phase update coordination.
//!
//! This crate updates a stored user in two short transactions with an
//! external call in between:
//! 1. Transaction A: load, apply the payload, save, commit
//! 2. External call, with no transaction open
//! 3. Transaction B: reload, apply the external result, save, commit
//!
//! A failure after transaction A leaves its change committed. Such partial
//! outcomes surface as distinct [`UpdateError`] kinds, and an optional
//! caller-supplied [`Compensation`] hook runs when transaction B fails.

pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod external;
pub mod retry;
pub mod state;

pub use compensation::{Compensation, CompensationContext, CompensationError};
pub use coordinator::UpdateCoordinator;
pub use error::{Result, StepFailure, UpdateError};
pub use external::{
    ExternalCallError, ExternalClient, HttpClientConfig, HttpExternalClient,
    InMemoryExternalClient,
};
pub use retry::RetryPolicy;
pub use state::{FailedStep, UpdateState};
