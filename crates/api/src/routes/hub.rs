//! Route definitions for listener registration.

use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::hub;
use crate::state::AppState;

/// Routes mounted at `/api/hub`.
///
/// ```text
/// GET    /          -> list_listeners
/// POST   /          -> register
/// DELETE /{id}      -> unregister
/// GET    /reports   -> recent_reports
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(hub::list_listeners).post(hub::register))
        .route("/reports", get(hub::recent_reports))
        .route("/{id}", delete(hub::unregister))
}
