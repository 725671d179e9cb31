//! Structured outcome of one fan-out.

use serde::Serialize;
use tmf720_core::mutation::EventType;
use tmf720_core::types::Timestamp;

use crate::delivery::DeliveryError;
use crate::registry::ListenerId;

/// One delivery try to one listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub number: u32,
    pub started_at: Timestamp,
    /// `None` when the attempt succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeliveryError>,
}

/// Final result of delivering one event to one listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeliveryOutcome {
    Delivered,
    /// Every allowed attempt failed; the event is dropped for this listener.
    Exhausted {
        #[serde(rename = "lastError")]
        last_error: DeliveryError,
    },
    /// The hub shut down before the delivery could finish.
    Abandoned,
}

/// Per-listener section of a [`DispatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerReport {
    pub listener_id: ListenerId,
    pub endpoint: String,
    pub outcome: DeliveryOutcome,
    pub attempts: Vec<AttemptRecord>,
}

impl ListenerReport {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }
}

/// Summary of one dispatch: which listeners got the event and how many
/// tries it took. Observability only; never surfaced as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub event_id: String,
    pub event_type: EventType,
    pub resource_id: String,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    /// One entry per matched listener, in registry order.
    pub listeners: Vec<ListenerReport>,
}

impl DispatchReport {
    pub fn for_listener(&self, id: &ListenerId) -> Option<&ListenerReport> {
        self.listeners.iter().find(|l| &l.listener_id == id)
    }

    pub fn delivered_count(&self) -> usize {
        self.listeners.iter().filter(|l| l.delivered()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.listeners.len() - self.delivered_count()
    }
}
