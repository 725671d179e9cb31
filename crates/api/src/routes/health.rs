use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of registered listeners.
    pub listeners: usize,
    /// Whether the hub still accepts new events.
    pub hub_accepting: bool,
}

/// GET /health -- returns service and hub health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let hub_accepting = !state.hub.is_closing();
    let status = if hub_accepting { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        listeners: state.hub.registry().len().await,
        hub_accepting,
    })
}

/// Mount health check routes at the root.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
