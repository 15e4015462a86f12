use lazy_static::lazy_static;
use regex::Regex;

use super::dto::{CourseUpdate, NewCourse, NewStudent};
use super::repo_types::{Student, StudentFilter};
use crate::error::ServiceError;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Katakana, long vowel mark, ASCII and full-width spaces.
    static ref KANA_RE: Regex = Regex::new(r"^[ァ-ヶー\s　]+$").unwrap();
}

pub const MAX_AGE: i32 = 150;

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_kana(kana: &str) -> bool {
    kana.is_empty() || KANA_RE.is_match(kana)
}

#[derive(Default)]
struct Problems(Vec<String>);

impl Problems {
    fn check(&mut self, ok: bool, msg: impl Into<String>) {
        if !ok {
            self.0.push(msg.into());
        }
    }

    fn into_result(self) -> Result<(), ServiceError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self.0.join("; ")))
        }
    }
}

fn check_person(
    p: &mut Problems,
    full_name: &str,
    kana: &str,
    email: &str,
    city: &str,
    age: i32,
) {
    p.check(!full_name.trim().is_empty(), "full_name must not be blank");
    p.check(is_valid_kana(kana), "kana must contain only katakana and spaces");
    if email.trim().is_empty() {
        p.check(false, "email must not be blank");
    } else {
        p.check(is_valid_email(email), "email is malformed");
    }
    p.check(!city.trim().is_empty(), "city must not be blank");
    p.check(
        (0..=MAX_AGE).contains(&age),
        format!("age must be between 0 and {MAX_AGE}"),
    );
}

pub fn validate_new_student(s: &NewStudent) -> Result<(), ServiceError> {
    let mut p = Problems::default();
    check_person(&mut p, &s.full_name, &s.kana, &s.email, &s.city, s.age);
    p.into_result()
}

pub fn validate_student(s: &Student) -> Result<(), ServiceError> {
    let mut p = Problems::default();
    check_person(&mut p, &s.full_name, &s.kana, &s.email, &s.city, s.age);
    p.into_result()
}

pub fn validate_new_course(c: &NewCourse) -> Result<(), ServiceError> {
    let mut p = Problems::default();
    p.check(!c.course_name.trim().is_empty(), "course_name must not be blank");
    if let (Some(start), Some(end)) = (c.start_date, c.end_date) {
        p.check(start <= end, "start_date must not be after end_date");
    }
    p.into_result()
}

pub fn validate_course_update(c: &CourseUpdate) -> Result<(), ServiceError> {
    let mut p = Problems::default();
    p.check(
        !c.course_name.trim().is_empty(),
        format!("course {}: course_name must not be blank", c.id),
    );
    p.check(
        c.start_date <= c.end_date,
        format!("course {}: start_date must not be after end_date", c.id),
    );
    p.into_result()
}

/// Status search can't be combined with field filters, and the age range
/// must be non-negative and ordered.
pub fn validate_search(has_status: bool, filter: &StudentFilter) -> Result<(), ServiceError> {
    if has_status && !filter.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "status cannot be combined with other search criteria".into(),
        ));
    }
    let negative = filter.min_age.is_some_and(|a| a < 0) || filter.max_age.is_some_and(|a| a < 0);
    let reversed = matches!((filter.min_age, filter.max_age), (Some(min), Some(max)) if min > max);
    if negative || reversed {
        return Err(ServiceError::InvalidRequest(
            "min_age/max_age are invalid: range is reversed or negative".into(),
        ));
    }
    Ok(())
}
