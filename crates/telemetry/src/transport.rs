//! Collector delivery.
//!
//! A transport performs exactly one submission of a batch. Retrying is the
//! tracker's business, which keeps transports trivial to fake in tests.

use agentcost_core::CostEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

/// Header carrying the collector credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a batch submission failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to track events: {status} {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// One-shot batch submission to a collector.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit the whole batch in a single request.
    async fn deliver(&self, events: &[CostEvent]) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct Batch<'a> {
    events: &'a [CostEvent],
}

/// JSON-over-HTTP transport for the AgentCost collector.
pub struct HttpTransport {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the given collector URL and credential.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// The collector URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, events: &[CostEvent]) -> Result<(), DeliveryError> {
        trace!(endpoint = %self.endpoint, count = events.len(), "Posting batch");

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Batch { events })
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
