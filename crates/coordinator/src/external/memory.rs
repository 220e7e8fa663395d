//! In-memory external client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::{Call, CallJournal};
use domain::{ExternalResult, UpdatePayload};

use super::{ExternalCallError, ExternalClient};

#[derive(Debug, Default)]
struct InMemoryClientState {
    received: Vec<UpdatePayload>,
    next_id: u32,
    failure: Option<ExternalCallError>,
    latency: Option<Duration>,
}

/// In-memory external client for testing and local runs.
///
/// Answers every call with a sequential `EXT-NNNN` reference unless a failure
/// is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExternalClient {
    state: Arc<Mutex<InMemoryClientState>>,
    journal: CallJournal,
}

impl InMemoryExternalClient {
    /// Creates a new in-memory external client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records every call into `journal`.
    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Configures the client to fail every call with a transport error.
    pub fn set_fail_on_call(&self, fail: bool) {
        self.state().failure =
            fail.then(|| ExternalCallError::Transport("connection refused".to_string()));
    }

    /// Configures the client to fail every call with `error`, or to succeed when None.
    pub fn set_failure(&self, error: Option<ExternalCallError>) {
        self.state().failure = error;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Returns the number of calls received.
    pub fn call_count(&self) -> usize {
        self.state().received.len()
    }

    /// Returns the payloads received, in order.
    pub fn received(&self) -> Vec<UpdatePayload> {
        self.state().received.clone()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ExternalClient for InMemoryExternalClient {
    async fn call(&self, payload: &UpdatePayload) -> Result<ExternalResult, ExternalCallError> {
        self.journal.record(Call::ExternalCall);

        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        state.received.push(payload.clone());

        if let Some(ref error) = state.failure {
            return Err(error.clone());
        }

        state.next_id += 1;
        Ok(ExternalResult::new(format!("EXT-{:04}", state.next_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_references() {
        let client = InMemoryExternalClient::new();
        let payload = UpdatePayload::new().with_display_name("Ada");

        let r1 = client.call(&payload).await.unwrap();
        let r2 = client.call(&payload).await.unwrap();

        assert_eq!(r1.external_ref, "EXT-0001");
        assert_eq!(r2.external_ref, "EXT-0002");
        assert_eq!(client.call_count(), 2);
        assert_eq!(client.received(), vec![payload.clone(), payload]);
    }

    #[tokio::test]
    async fn test_fail_on_call() {
        let client = InMemoryExternalClient::new();
        client.set_fail_on_call(true);

        let result = client.call(&UpdatePayload::new()).await;
        assert!(matches!(result, Err(ExternalCallError::Transport(_))));

        client.set_fail_on_call(false);
        assert!(client.call(&UpdatePayload::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_failure() {
        let client = InMemoryExternalClient::new();
        let timeout = ExternalCallError::Timeout(Duration::from_secs(5));
        client.set_failure(Some(timeout.clone()));

        assert_eq!(client.call(&UpdatePayload::new()).await, Err(timeout));
    }

    #[tokio::test]
    async fn test_records_into_journal() {
        let journal = CallJournal::new();
        let client = InMemoryExternalClient::new().with_journal(journal.clone());
        client.call(&UpdatePayload::new()).await.unwrap();
        assert_eq!(journal.calls(), vec![Call::ExternalCall]);
    }
}
