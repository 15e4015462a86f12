use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::Status;

/// Body of `POST /students/courses/enrollment-status`.
#[derive(Debug, Deserialize)]
pub struct AdvanceStatusRequest {
    pub course_id: Uuid,
    pub status: Status,
}
