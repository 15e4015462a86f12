use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::enrollment::repo_types::StatusEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    NonBinary,
    Unspecified,
}

/// A registered student. Two students are equal only if every field matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub kana: String,
    #[serde(default)]
    pub nick_name: String,
    pub email: String,
    pub city: String,
    pub age: i32,
    pub gender: Gender,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A student's enrollment in a named course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub student_id: Uuid,
    pub course_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    /// Latest status entry, for display only.
    #[serde(default)]
    pub enrollment_status: Option<StatusEntry>,
}

impl Course {
    /// Compares only the fields the update path may change.
    pub fn differs_from(&self, current: &Course) -> bool {
        self.course_name != current.course_name
            || self.start_date != current.start_date
            || self.end_date != current.end_date
    }
}

/// Optional search criteria; `None` means "don't filter on this".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
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

impl StudentFilter {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.kana.is_none()
            && self.nick_name.is_none()
            && self.email.is_none()
            && self.city.is_none()
            && self.min_age.is_none()
            && self.max_age.is_none()
            && self.gender.is_none()
            && self.remark.is_none()
    }

    /// In-process equivalent of the SQL search predicate.
    pub fn matches(&self, s: &Student) -> bool {
        fn contains(field: &str, needle: &Option<String>) -> bool {
            needle
                .as_deref()
                .map_or(true, |n| field.to_lowercase().contains(&n.to_lowercase()))
        }

        !s.is_deleted
            && contains(&s.full_name, &self.full_name)
            && contains(&s.kana, &self.kana)
            && contains(&s.nick_name, &self.nick_name)
            && contains(&s.email, &self.email)
            && contains(&s.city, &self.city)
            && contains(&s.remark, &self.remark)
            && self.min_age.map_or(true, |min| s.age >= min)
            && self.max_age.map_or(true, |max| s.age <= max)
            && self.gender.map_or(true, |g| s.gender == g)
    }
}

/// Same calendar date one year later; Feb 29 lands on Feb 28.
pub fn one_year_after(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_year(t.year() + 1)
        .unwrap_or_else(|_| t + Duration::days(365))
}

/// Drops sub-microsecond digits, the finest precision `TIMESTAMPTZ` keeps.
pub fn truncate_to_micros(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond() % 1_000))
}
