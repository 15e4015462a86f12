use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{dto::AdvanceStatusRequest, repo_types::StatusEntry, services};
use crate::error::ServiceError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/students/courses/enrollment-status", post(advance_status))
        .route("/students/courses/:id/enrollment-status", get(status_history))
}

/// Records the next enrollment stage for a course.
#[instrument(skip(state))]
pub async fn advance_status(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<AdvanceStatusRequest>,
) -> Result<(StatusCode, Json<StatusEntry>), ServiceError> {
    let mut tx = state.store.begin().await?;
    let entry = services::advance(tx.as_mut(), payload.course_id, payload.status).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[instrument(skip(state))]
pub async fn status_history(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Vec<StatusEntry>>, ServiceError> {
    let mut tx = state.store.begin().await?;
    let lineage = services::history(tx.as_mut(), id).await?;
    Ok(Json(lineage))
}
