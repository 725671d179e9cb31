//! Delivery channels: one network attempt to push an event to a listener.
//!
//! The [`Dispatcher`](crate::Dispatcher) owns retry, backoff and
//! concurrency; a channel only performs a single try and classifies how it
//! went.

pub mod webhook;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::envelope::Event;

/// Why a single delivery attempt failed.
///
/// Every variant is treated as transient: the hub does not inspect
/// listener responses beyond their status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeliveryError {
    /// Connection could not be established or was dropped.
    #[error("Listener unreachable: {reason}")]
    Unreachable { reason: String },

    /// No response within the delivery timeout.
    #[error("Delivery timed out after {after_ms} ms")]
    Timeout {
        #[serde(rename = "afterMs")]
        after_ms: u64,
    },

    /// The listener answered with a non-2xx status.
    #[error("Listener rejected delivery with HTTP {status}")]
    RejectedByListener { status: u16 },
}

impl DeliveryError {
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: after.as_millis().try_into().unwrap_or(u64::MAX),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "unreachable",
            Self::Timeout { .. } => "timeout",
            Self::RejectedByListener { .. } => "rejected",
        }
    }
}

/// Performs one delivery attempt of an event to a listener endpoint.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn deliver(&self, endpoint: &str, event: &Event) -> Result<(), DeliveryError>;
}
