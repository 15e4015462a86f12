use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Enrollment stage of a course. Stages only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "enrollment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pending,
    Approved,
    InProgress,
    Completed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Pending,
        Status::Approved,
        Status::InProgress,
        Status::Completed,
    ];

    /// Position in the fixed ordering, starting at 1.
    pub fn rank(self) -> u8 {
        match self {
            Status::Pending => 1,
            Status::Approved => 2,
            Status::InProgress => 3,
            Status::Completed => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "PENDING",
            Status::Approved => "APPROVED",
            Status::InProgress => "IN_PROGRESS",
            Status::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable record of a course's status at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusEntry {
    pub id: Uuid,
    pub course_id: Uuid,
    pub status: Status,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Assigned by the store on insert; breaks ties between equal timestamps.
    #[serde(default)]
    pub seq: i64,
}

impl StatusEntry {
    pub fn new(course_id: Uuid, status: Status, created_at: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id,
            status,
            created_at,
            seq: 0,
        }
    }
}

/// The entry with the latest timestamp, highest sequence number on ties.
pub fn current_entry(lineage: &[StatusEntry]) -> Option<&StatusEntry> {
    lineage.iter().max_by_key(|e| (e.created_at, e.seq))
}
