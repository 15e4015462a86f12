use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::enrollment::repo_types::Status;

/// Errors surfaced by the service layer. Every variant is terminal for the
/// current request; the surrounding transaction is rolled back.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("student {0} was not found")]
    StudentNotFound(Uuid),

    #[error("course {course_id} was not found for student {student_id}")]
    CourseNotFound { course_id: Uuid, student_id: Uuid },

    #[error("no enrollment status has been recorded for course {0}")]
    StatusLineageNotFound(Uuid),

    #[error("status cannot move to {requested}; current: {current}")]
    NonMonotonicTransition { current: Status, requested: Status },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::StudentNotFound(_)
            | ServiceError::CourseNotFound { .. }
            | ServiceError::StatusLineageNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::NonMonotonicTransition { .. }
            | ServiceError::Validation(_)
            | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServiceError::StudentNotFound(_) => "Student Not Found",
            ServiceError::CourseNotFound { .. } => "Course Not Found",
            ServiceError::StatusLineageNotFound(_) => "Enrollment Status Not Found",
            ServiceError::NonMonotonicTransition { .. } => "Invalid Status Transition",
            ServiceError::Validation(_) => "Validation Error",
            ServiceError::InvalidRequest(_) => "Invalid Request",
            ServiceError::Internal(_) => "Internal Server Error",
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(%rejection, "rejected request body");
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        debug!(%rejection, "rejected path parameter");
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(%rejection, "rejected query string");
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ServiceError::Internal(e) => {
                error!(error = ?e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
