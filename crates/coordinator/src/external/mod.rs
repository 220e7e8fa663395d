//! External client trait and implementations.
//!
//! The external call runs outside any transaction. Timeouts are configured on
//! the client; a timeout is reported like any other call failure.

pub mod http;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::{ExternalResult, UpdatePayload};
use thiserror::Error;

pub use http::{HttpClientConfig, HttpExternalClient};
pub use memory::InMemoryExternalClient;

/// Errors from the external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExternalCallError {
    /// No response within the configured timeout.
    #[error("External call timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be delivered or the connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The external service answered with a non-success status.
    #[error("External service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Trait for the network call made between the two transactions.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    /// Sends `payload` to the external system and returns its result.
    async fn call(&self, payload: &UpdatePayload) -> Result<ExternalResult, ExternalCallError>;
}

#[async_trait]
impl<T: ExternalClient + ?Sized> ExternalClient for Arc<T> {
    async fn call(&self, payload: &UpdatePayload) -> Result<ExternalResult, ExternalCallError> {
        (**self).call(payload).await
    }
}
