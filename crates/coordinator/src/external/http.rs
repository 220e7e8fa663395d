//! HTTP external client backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use domain::{ExternalResult, UpdatePayload};

use super::{ExternalCallError, ExternalClient};

/// Error bodies longer than this are truncated before being reported.
const MAX_ERROR_BODY_BYTES: usize = 2048;

/// Success bodies longer than this are rejected without being decoded.
const MAX_RESPONSE_BODY_BYTES: usize = 64 * 1024;

/// Configuration of the [`HttpExternalClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// URL the payload is POSTed to.
    pub endpoint: String,

    /// Total time allowed for a single call, including reading the body.
    pub timeout: Duration,
}

impl HttpClientConfig {
    /// Creates a configuration with the default 5 second timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// External client that POSTs the payload as JSON and decodes an
/// [`ExternalResult`] from a 2xx response.
#[derive(Debug, Clone)]
pub struct HttpExternalClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpExternalClient {
    /// Builds a client for `config`.
    pub fn new(config: HttpClientConfig) -> Result<Self, ExternalCallError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExternalCallError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn map_error(&self, error: reqwest::Error) -> ExternalCallError {
        if error.is_timeout() {
            ExternalCallError::Timeout(self.config.timeout)
        } else {
            ExternalCallError::Transport(error.to_string())
        }
    }

    /// Reads at most `limit` bytes of the body, returning them and whether
    /// the body was longer.
    async fn read_capped(
        &self,
        response: &mut reqwest::Response,
        limit: usize,
    ) -> Result<(Vec<u8>, bool), ExternalCallError> {
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(e))? {
            let room = limit - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                return Ok((body, true));
            }
            body.extend_from_slice(&chunk);
        }
        Ok((body, false))
    }
}

fn oversized() -> ExternalCallError {
    ExternalCallError::InvalidResponse(format!(
        "response body exceeds {MAX_RESPONSE_BODY_BYTES} bytes"
    ))
}

fn render_body(bytes: &[u8], truncated: bool) -> String {
    let text = String::from_utf8_lossy(bytes);
    if truncated {
        format!("{text}...(truncated)")
    } else {
        text.into_owned()
    }
}

#[async_trait]
impl ExternalClient for HttpExternalClient {
    #[tracing::instrument(skip(self, payload), fields(endpoint = %self.config.endpoint))]
    async fn call(&self, payload: &UpdatePayload) -> Result<ExternalResult, ExternalCallError> {
        let mut response = self
            .client
            .post(&self.config.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "external call rejected");
            let (body, truncated) = self
                .read_capped(&mut response, MAX_ERROR_BODY_BYTES)
                .await?;
            return Err(ExternalCallError::Status {
                status: status.as_u16(),
                body: render_body(&body, truncated),
            });
        }

        if response
            .content_length()
            .is_some_and(|len| len > MAX_RESPONSE_BODY_BYTES as u64)
        {
            tracing::warn!(length = ?response.content_length(), "external response too large");
            return Err(oversized());
        }
        let (body, truncated) = self
            .read_capped(&mut response, MAX_RESPONSE_BODY_BYTES)
            .await?;
        if truncated {
            return Err(oversized());
        }

        serde_json::from_slice(&body).map_err(|e| ExternalCallError::InvalidResponse(e.to_string()))
    }
}
