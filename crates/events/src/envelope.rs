//! The event envelope delivered to listeners.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tmf720_core::mutation::{EventType, ResourceSnapshot};
use tmf720_core::types::Timestamp;

/// An immutable, uniquely identified resource lifecycle event.
///
/// Serializes to the listener wire shape:
///
/// ```json
/// {
///   "eventId": "…",
///   "eventTime": "2024-01-01T00:00:00Z",
///   "eventType": "ResourceCreated",
///   "event": { "digitalIdentity": { … } }
/// }
/// ```
///
/// Fields are private; once built an event is shared behind `Arc` and
/// presented identically to every listener and on every retry.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_id: String,
    event_time: Timestamp,
    event_type: EventType,
    resource: ResourceSnapshot,
}

impl Event {
    /// Wrap a committed mutation into a fresh event.
    ///
    /// Every call yields a new `eventId`, even for byte-identical payloads.
    pub fn build(event_type: EventType, resource: ResourceSnapshot) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_time: chrono::Utc::now(),
            event_type,
            resource,
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_time(&self) -> Timestamp {
        self.event_time
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Resource kind the payload is keyed under.
    pub fn resource_kind(&self) -> &'static str {
        self.resource.kind
    }

    pub fn resource_id(&self) -> &str {
        &self.resource.id
    }

    /// The post-mutation record (last known state for deletes).
    pub fn payload(&self) -> &serde_json::Value {
        &self.resource.body
    }

    /// The wire document as a JSON value, used for filter evaluation.
    pub fn to_document(&self) -> serde_json::Value {
        let mut keyed = serde_json::Map::new();
        keyed.insert(self.resource.kind.to_string(), self.resource.body.clone());

        serde_json::json!({
            "eventId": self.event_id,
            "eventTime": self.event_time,
            "eventType": self.event_type,
            "event": keyed,
        })
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Event", 4)?;
        state.serialize_field("eventId", &self.event_id)?;
        state.serialize_field("eventTime", &self.event_time)?;
        state.serialize_field("eventType", &self.event_type)?;
        state.serialize_field("event", &KeyedPayload(&self.resource))?;
        state.end()
    }
}

/// `{ "<kind>": <body> }`
struct KeyedPayload<'a>(&'a ResourceSnapshot);

impl Serialize for KeyedPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.0.kind, &self.0.body)?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
