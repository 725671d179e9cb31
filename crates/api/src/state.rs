use std::sync::Arc;

use tmf720_core::mutation::MutationObserver;
use tmf720_db::DigitalIdentityStore;
use tmf720_events::NotificationHub;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Digital identity records. Reports every committed mutation to `hub`.
    pub store: Arc<DigitalIdentityStore>,
    /// Listener registry and event dispatch.
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Wire a fresh store to an already started hub.
    pub fn new(config: ServerConfig, hub: Arc<NotificationHub>) -> Self {
        let observer: Arc<dyn MutationObserver> = hub.clone();
        let store = DigitalIdentityStore::new(config.public_base_url.clone(), observer);
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            hub,
        }
    }
}
