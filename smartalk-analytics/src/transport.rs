//! Batch delivery to the analytics ingestion endpoint
//!
//! `POST {base_url}/analytics/events/batch` with body `{"events": [...]}`.
//! Any 2xx is success; every other status, network error or timeout is a
//! delivery failure the buffer recovers from by re-queueing.

use async_trait::async_trait;
use serde::Serialize;
use smartalk_common::{AnalyticsConfig, Event};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("SmarTalk-Analytics/", env!("CARGO_PKG_VERSION"));

/// Batch delivery errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Batch delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Collector returned {0}: {1}")]
    Status(u16, String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Wire body of a batch delivery
#[derive(Debug, Serialize)]
pub struct BatchRequest<'a> {
    pub events: &'a [Event],
}

/// Delivers one batch of events to a remote collector
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send_batch(&self, events: &[Event]) -> Result<(), TransportError>;
}

/// HTTP collector client
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, TransportError> {
        Self::new(config.batch_endpoint(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    async fn send_batch(&self, events: &[Event]) -> Result<(), TransportError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            count = events.len(),
            "Posting analytics batch"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&BatchRequest { events })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout)
                } else if e.is_builder() || e.is_body() {
                    TransportError::Serialize(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TransportError::Status(status.as_u16(), error_text));
        }

        Ok(())
    }
}
