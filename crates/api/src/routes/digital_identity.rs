//! Route definitions for the TMF720 `digitalIdentity` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::digital_identity;
use crate::state::AppState;

/// Routes mounted at `/tmf-api/digitalIdentityManagement/v4/digitalIdentity`.
///
/// ```text
/// GET    /        -> list       (?fields, status, trustLevel)
/// POST   /        -> create
/// GET    /{id}    -> get_by_id  (?fields)
/// PATCH  /{id}    -> patch
/// DELETE /{id}    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(digital_identity::list).post(digital_identity::create),
        )
        .route(
            "/{id}",
            get(digital_identity::get_by_id)
                .patch(digital_identity::patch)
                .delete(digital_identity::delete),
        )
}
