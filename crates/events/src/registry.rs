//! Listener registry.
//!
//! The registry is the only shared mutable state in the hub. All access
//! goes through one `RwLock`, so register/unregister/snapshot are
//! linearizable with respect to each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tmf720_core::error::CoreError;

use crate::filter::{EventFilter, FilterError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Opaque listener identifier, assigned at registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ListenerId(String);

impl ListenerId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ListenerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered listener. Never mutated after registration.
///
/// Serializes to the hub API shape `{ "id", "callback", "query"? }`.
#[derive(Debug, Clone, Serialize)]
pub struct Listener {
    pub id: ListenerId,
    pub callback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip)]
    filter: Option<EventFilter>,
}

impl Listener {
    /// Whether this listener wants an event, given the event's wire document.
    pub fn accepts(&self, document: &serde_json::Value) -> bool {
        self.filter.as_ref().map_or(true, |f| f.matches(document))
    }
}

/// Registry failures. Returned straight to the caller; never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Listener already registered for callback {0}")]
    DuplicateListener(String),

    #[error("Listener not found: {0}")]
    ListenerNotFound(ListenerId),

    #[error("Invalid callback URL '{url}': {reason}")]
    InvalidCallback { url: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidFilter(#[from] FilterError),
}

impl From<RegistryError> for CoreError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateListener(_) => CoreError::Conflict(err.to_string()),
            RegistryError::ListenerNotFound(id) => CoreError::NotFound {
                entity: "Listener",
                id: id.0,
            },
            RegistryError::InvalidCallback { .. } | RegistryError::InvalidFilter(_) => {
                CoreError::Validation(err.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ListenerRegistry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    /// Insertion-ordered listeners.
    listeners: IndexMap<ListenerId, Arc<Listener>>,
    /// Normalized callback URLs currently in use.
    endpoints: HashSet<String>,
    /// Consecutive exhausted deliveries per listener.
    failure_streaks: HashMap<ListenerId, u32>,
}

/// Mapping of listener identity to callback and filter.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: RwLock<Inner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    ///
    /// The listener is eligible for every dispatch that snapshots the
    /// registry after this returns.
    pub async fn register(
        &self,
        callback: &str,
        query: Option<&str>,
    ) -> Result<Listener, RegistryError> {
        let callback = callback.trim();
        let key = normalize_callback(callback)?;

        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let filter = match query {
            Some(q) => EventFilter::parse(q)?,
            None => None,
        };

        let mut inner = self.inner.write().await;
        if inner.endpoints.contains(&key) {
            return Err(RegistryError::DuplicateListener(callback.to_string()));
        }

        let listener = Listener {
            id: ListenerId::generate(),
            callback: callback.to_string(),
            query: query.map(str::to_string),
            filter,
        };
        inner.endpoints.insert(key);
        inner
            .listeners
            .insert(listener.id.clone(), Arc::new(listener.clone()));

        Ok(listener)
    }

    /// Remove a listener.
    ///
    /// Deliveries already handed to the dispatcher are not cancelled.
    pub async fn unregister(&self, id: &ListenerId) -> Result<Listener, RegistryError> {
        let mut inner = self.inner.write().await;
        let removed = inner
            .listeners
            .shift_remove(id)
            .ok_or_else(|| RegistryError::ListenerNotFound(id.clone()))?;

        if let Ok(key) = normalize_callback(&removed.callback) {
            inner.endpoints.remove(&key);
        }
        inner.failure_streaks.remove(id);

        Ok(Listener::clone(&removed))
    }

    /// The current listener set, in registration order.
    pub async fn snapshot(&self) -> Vec<Arc<Listener>> {
        self.inner.read().await.listeners.values().cloned().collect()
    }

    pub async fn get(&self, id: &ListenerId) -> Option<Listener> {
        self.inner
            .read()
            .await
            .listeners
            .get(id)
            .map(|l| Listener::clone(l))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.listeners.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reset the failure streak after a successful delivery.
    pub async fn record_success(&self, id: &ListenerId) {
        self.inner.write().await.failure_streaks.remove(id);
    }

    /// Count an exhausted delivery; returns the new streak length.
    ///
    /// Unknown listeners (already unregistered) report zero.
    pub async fn record_exhausted(&self, id: &ListenerId) -> u32 {
        let mut inner = self.inner.write().await;
        if !inner.listeners.contains_key(id) {
            return 0;
        }
        let streak = inner.failure_streaks.entry(id.clone()).or_insert(0);
        *streak += 1;
        *streak
    }
}

/// Validate a callback URL and produce its uniqueness key.
fn normalize_callback(callback: &str) -> Result<String, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidCallback {
        url: callback.to_string(),
        reason,
    };

    if callback.is_empty() {
        return Err(invalid("callback is required".into()));
    }
    let url = reqwest::Url::parse(callback).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(url.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
