//! HTTP transport for webhook delivery.

use std::time::Duration;

use crate::webhooks::{TransportError, WebhookEndpoint, WebhookPayload, WebhookTransport};

/// Delivers webhook bodies as `POST <url>` with a JSON body.
///
/// The client carries a bounded per-request timeout so a hanging endpoint
/// stalls only this listener's turn in the dispatch, never the whole process.
#[derive(Debug, Clone)]
pub struct HttpWebhookTransport {
    client: reqwest::blocking::Client,
}

impl HttpWebhookTransport {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_default_timeout() -> Result<Self, TransportError> {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl WebhookTransport for HttpWebhookTransport {
    fn deliver(
        &self,
        endpoint: &WebhookEndpoint,
        payload: &WebhookPayload,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(&endpoint.url)
            .json(payload)
            .send()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}
