//! HTTP webhook delivery.
//!
//! [`WebhookDelivery`] POSTs the JSON-encoded [`Event`] to a listener's
//! callback URL. It makes exactly one attempt per call; retries belong to
//! the dispatcher.

use std::time::Duration;

use async_trait::async_trait;

use super::{DeliveryChannel, DeliveryError};
use crate::envelope::Event;

/// Delivers events to listener callbacks over HTTP.
pub struct WebhookDelivery {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookDelivery {
    /// Create a delivery channel whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    fn classify(&self, err: reqwest::Error) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::timeout(self.timeout)
        } else if let Some(status) = err.status() {
            DeliveryError::RejectedByListener {
                status: status.as_u16(),
            }
        } else {
            DeliveryError::Unreachable {
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookDelivery {
    async fn deliver(&self, endpoint: &str, event: &Event) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::RejectedByListener {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
