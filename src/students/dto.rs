use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Course, Gender, Student, StudentFilter};
use crate::enrollment::repo_types::Status;

/// A student together with its courses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentDetail {
    pub student: Student,
    pub courses: Vec<Course>,
}

/// Student fields accepted at registration; id, remark and the delete flag
/// are assigned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub full_name: String,
    #[serde(default)]
    pub kana: String,
    #[serde(default)]
    pub nick_name: String,
    pub email: String,
    pub city: String,
    pub age: i32,
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourse {
    pub course_name: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    /// Initial enrollment status.
    pub status: Status,
}

/// Body of `POST /students`.
#[derive(Debug, Deserialize)]
pub struct RegisterStudentRequest {
    pub student: NewStudent,
    pub course: NewCourse,
}

/// Desired state of an existing course. Status is not updatable here.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseUpdate {
    pub id: Uuid,
    pub course_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
}

/// Body of `PUT /students`.
#[derive(Debug, Deserialize)]
pub struct UpdateStudentRequest {
    pub student: Student,
    #[serde(default)]
    pub courses: Vec<CourseUpdate>,
}

#[derive(Debug, Serialize)]
pub struct UpdateStudentResponse {
    pub message: &'static str,
    pub student_updated: bool,
    pub courses_updated: usize,
}

/// Query string of `GET /students`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub status: Option<Status>,
    pub full_name: Option<String>,
    pub kana: Option<String>,
    pub nick_name: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub gender: Option<Gender>,
    pub remark: Option<String>,
}

impl SearchQuery {
    pub fn into_parts(self) -> (Option<Status>, StudentFilter) {
        let filter = StudentFilter {
            full_name: self.full_name,
            kana: self.kana,
            nick_name: self.nick_name,
            email: self.email,
            city: self.city,
            min_age: self.min_age,
            max_age: self.max_age,
            gender: self.gender,
            remark: self.remark,
        };
        (self.status, filter)
    }
}
