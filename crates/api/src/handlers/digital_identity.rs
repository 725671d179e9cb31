//! Handlers for the TMF720 `digitalIdentity` resource.
//!
//! Every successful mutation is reported to the notification hub by the
//! store itself; handlers never wait for delivery.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{Map, Value};
use tmf720_core::digital_identity::{DigitalIdentity, DigitalIdentityInput, RESOURCE_KIND};
use tmf720_core::error::CoreError;
use tmf720_core::listing::{FieldSelection, ListFilter};
use tmf720_core::validation::{validate_create, validate_patch};

use crate::error::{AppError, AppResult};
use crate::query::{FieldsParams, ListIdentityParams};
use crate::state::AppState;

/// POST /tmf-api/digitalIdentityManagement/v4/digitalIdentity
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<DigitalIdentity>)> {
    let input: DigitalIdentityInput = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid digital identity: {e}")))?;
    validate_create(&input)?;

    let record = state.store.create(input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /tmf-api/digitalIdentityManagement/v4/digitalIdentity
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListIdentityParams>,
) -> AppResult<Json<Vec<Value>>> {
    let filter = ListFilter::parse(params.status.as_deref(), params.trust_level.as_deref())?;
    let fields = FieldSelection::parse(params.fields.as_deref());

    let records = state
        .store
        .list(&filter)
        .await
        .iter()
        .map(|r| to_json(r).map(|v| fields.project(v)))
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(records))
}

/// GET /tmf-api/digitalIdentityManagement/v4/digitalIdentity/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<FieldsParams>,
) -> AppResult<Json<Value>> {
    let record = state.store.get(&id).await.ok_or_else(|| not_found(id))?;
    let fields = FieldSelection::parse(params.fields.as_deref());
    Ok(Json(fields.project(to_json(&record)?)))
}

/// PATCH /tmf-api/digitalIdentityManagement/v4/digitalIdentity/{id}
pub async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Map<String, Value>>,
) -> AppResult<Json<DigitalIdentity>> {
    validate_patch(&changes)?;
    let record = state.store.patch(&id, &changes).await?;
    Ok(Json(record))
}

/// DELETE /tmf-api/digitalIdentityManagement/v4/digitalIdentity/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    state.store.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn to_json(record: &DigitalIdentity) -> AppResult<Value> {
    serde_json::to_value(record).map_err(|e| AppError::InternalError(e.to_string()))
}

fn not_found(id: String) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: RESOURCE_KIND,
        id,
    })
}
