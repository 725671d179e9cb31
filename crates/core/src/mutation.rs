//! Lifecycle event types and the seam between the resource store and the
//! notification hub.
//!
//! The store knows nothing about listeners. After each committed
//! mutation it hands a [`ResourceSnapshot`] to its [`MutationObserver`];
//! the hub is one such observer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// The closed set of resource lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    ResourceCreated,
    ResourceAttributeChanged,
    ResourceDeleted,
}

impl EventType {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceCreated => "ResourceCreated",
            Self::ResourceAttributeChanged => "ResourceAttributeChanged",
            Self::ResourceDeleted => "ResourceDeleted",
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "ResourceCreated" => Ok(Self::ResourceCreated),
            "ResourceAttributeChanged" => Ok(Self::ResourceAttributeChanged),
            "ResourceDeleted" => Ok(Self::ResourceDeleted),
            _ => Err(CoreError::Validation(format!(
                "Invalid eventType: '{s}'. Must be one of: ResourceCreated, \
                 ResourceAttributeChanged, ResourceDeleted"
            ))),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A resource type whose mutations are announced to listeners.
pub trait Notifiable: Serialize {
    /// Name of the resource kind, used as the key inside the event body
    /// (e.g. `"digitalIdentity"`).
    const KIND: &'static str;

    /// Stable key of this resource instance.
    fn resource_id(&self) -> &str;
}

/// The post-mutation state of one resource, already rendered to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSnapshot {
    pub kind: &'static str,
    pub id: String,
    pub body: serde_json::Value,
}

impl ResourceSnapshot {
    /// Capture the current state of a resource.
    pub fn of<R: Notifiable>(resource: &R) -> Result<Self, CoreError> {
        let body = serde_json::to_value(resource).map_err(|e| {
            CoreError::Internal(format!("Failed to serialize {} snapshot: {e}", R::KIND))
        })?;
        Ok(Self {
            kind: R::KIND,
            id: resource.resource_id().to_string(),
            body,
        })
    }
}

// ---------------------------------------------------------------------------
// MutationObserver
// ---------------------------------------------------------------------------

/// Callback invoked by the resource store after each successful mutation.
///
/// Called synchronously and in commit order. Implementations must not
/// block: anything slow belongs on a background task.
pub trait MutationObserver: Send + Sync {
    fn on_mutation_committed(&self, event_type: EventType, snapshot: ResourceSnapshot);
}

/// Observer that ignores every mutation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl MutationObserver for NoopObserver {
    fn on_mutation_committed(&self, _event_type: EventType, _snapshot: ResourceSnapshot) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
