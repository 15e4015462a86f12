use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    RegisterStudentRequest, SearchQuery, StudentDetail, UpdateStudentRequest,
    UpdateStudentResponse,
};
use super::{services, validation};
use crate::error::ServiceError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students))
        .route("/students/:id", get(get_student))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route(
        "/students",
        axum::routing::post(register_student).put(update_student),
    )
}

// --- handlers ---

/// GET /students: field search, or `?status=` for current-status search.
#[instrument(skip(state))]
pub async fn list_students(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<StudentDetail>>, ServiceError> {
    let (status, filter) = q.into_parts();
    validation::validate_search(status.is_some(), &filter)?;

    let mut tx = state.store.begin().await?;
    let details = match status {
        Some(status) => services::search_by_status(tx.as_mut(), status).await?,
        None => services::search(tx.as_mut(), &filter).await?,
    };
    Ok(Json(details))
}

#[instrument(skip(state))]
pub async fn get_student(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<StudentDetail>, ServiceError> {
    let mut tx = state.store.begin().await?;
    let detail = services::find_by_id(tx.as_mut(), id).await?;
    Ok(Json(detail))
}

/// POST /students: student, first course and initial status in one go.
#[instrument(skip(state, payload))]
pub async fn register_student(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterStudentRequest>,
) -> Result<(StatusCode, HeaderMap, Json<StudentDetail>), ServiceError> {
    let mut tx = state.store.begin().await?;
    let (student, course) =
        services::register_student_with_course(tx.as_mut(), payload.student, payload.course)
            .await?;
    tx.commit().await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/students/{}", student.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }

    Ok((
        StatusCode::CREATED,
        headers,
        Json(StudentDetail {
            student,
            courses: vec![course],
        }),
    ))
}

/// PUT /students: writes only what differs from the stored state.
#[instrument(skip(state, payload), fields(student_id = %payload.student.id))]
pub async fn update_student(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UpdateStudentRequest>,
) -> Result<Json<UpdateStudentResponse>, ServiceError> {
    let mut tx = state.store.begin().await?;
    let outcome = services::update(tx.as_mut(), &payload.student, &payload.courses).await?;
    tx.commit().await?;

    if !outcome.student_updated && outcome.courses_updated == 0 {
        info!("update request carried no changes");
    }
    Ok(Json(UpdateStudentResponse {
        message: "update succeeded",
        student_updated: outcome.student_updated,
        courses_updated: outcome.courses_updated,
    }))
}
