//! Handlers for listener registration and dispatch reports.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tmf720_events::{DispatchReport, Listener, ListenerId};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Listener registration request body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterListener {
    pub callback: Option<String>,
    pub query: Option<String>,
}

/// POST /api/hub
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterListener>,
) -> AppResult<(StatusCode, Json<Listener>)> {
    let callback = input
        .callback
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("callback is required".into()))?;

    let listener = state.hub.register(&callback, input.query.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(listener)))
}

/// GET /api/hub
pub async fn list_listeners(State(state): State<AppState>) -> Json<Vec<Listener>> {
    Json(state.hub.listeners().await)
}

/// DELETE /api/hub/{id}
pub async fn unregister(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.hub.unregister(&ListenerId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/hub/reports
pub async fn recent_reports(State(state): State<AppState>) -> Json<Vec<DispatchReport>> {
    Json(state.hub.recent_reports().await)
}
