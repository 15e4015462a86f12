use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::dto::{CourseUpdate, NewCourse, NewStudent, StudentDetail};
use super::repo_types::{
    one_year_after, truncate_to_micros, Course, Gender, Student, StudentFilter,
};
use super::validation;
use crate::enrollment::repo_types::{Status, StatusEntry};
use crate::error::{ServiceError, ServiceResult};
use crate::store::Tx;

/// Pairs every student with its courses, keeping the students' order.
pub fn assemble_details(students: Vec<Student>, courses: Vec<Course>) -> Vec<StudentDetail> {
    let mut by_student: HashMap<Uuid, Vec<Course>> = HashMap::new();
    for c in courses {
        by_student.entry(c.student_id).or_default().push(c);
    }
    students
        .into_iter()
        .map(|student| StudentDetail {
            courses: by_student.remove(&student.id).unwrap_or_default(),
            student,
        })
        .collect()
}

pub async fn search(tx: &mut dyn Tx, filter: &StudentFilter) -> ServiceResult<Vec<StudentDetail>> {
    let students = tx.search_students(filter).await?;
    let courses = tx.load_all_courses().await?;
    debug!(students = students.len(), "student search");
    Ok(assemble_details(students, courses))
}

/// Students having at least one course whose current status is `status`.
/// Each detail lists only the matching courses.
pub async fn search_by_status(tx: &mut dyn Tx, status: Status) -> ServiceResult<Vec<StudentDetail>> {
    let courses = tx.load_courses_with_current_status(status).await?;

    let mut students = Vec::new();
    for course in &courses {
        if students.iter().any(|s: &Student| s.id == course.student_id) {
            continue;
        }
        match tx.load_student(course.student_id).await? {
            Some(s) if !s.is_deleted => students.push(s),
            _ => {}
        }
    }
    Ok(assemble_details(students, courses))
}

pub async fn find_by_id(tx: &mut dyn Tx, id: Uuid) -> ServiceResult<StudentDetail> {
    let student = tx
        .load_student(id)
        .await?
        .ok_or(ServiceError::StudentNotFound(id))?;
    let courses = tx.load_courses_for_student(id).await?;
    Ok(StudentDetail { student, courses })
}

/// Creates a student, its first course and the course's initial status, in
/// that order. Any initial status is accepted.
pub async fn register_student_with_course(
    tx: &mut dyn Tx,
    desired_student: NewStudent,
    desired_course: NewCourse,
) -> ServiceResult<(Student, Course)> {
    validation::validate_new_student(&desired_student)?;
    validation::validate_new_course(&desired_course)?;

    let now = truncate_to_micros(OffsetDateTime::now_utc());
    let student = Student {
        id: Uuid::new_v4(),
        full_name: desired_student.full_name,
        kana: desired_student.kana,
        nick_name: desired_student.nick_name,
        email: desired_student.email,
        city: desired_student.city,
        age: desired_student.age,
        gender: desired_student.gender.unwrap_or(Gender::Unspecified),
        remark: String::new(),
        is_deleted: false,
    };

    let start_date = desired_course.start_date.map_or(now, truncate_to_micros);
    let mut course = Course {
        id: Uuid::new_v4(),
        student_id: student.id,
        course_name: desired_course.course_name,
        start_date,
        end_date: desired_course
            .end_date
            .map_or_else(|| one_year_after(start_date), truncate_to_micros),
        enrollment_status: None,
    };
    let initial = StatusEntry::new(course.id, desired_course.status, now);

    tx.create_student(&student).await?;
    tx.create_course(&course).await?;
    let initial = tx.append_status(&initial).await?;
    course.enrollment_status = Some(initial);

    info!(student_id = %student.id, course_id = %course.id, "student registered");
    Ok((student, course))
}

/// Writes `desired` over the stored student when they differ.
/// Returns whether a write was issued.
pub async fn reconcile_student(tx: &mut dyn Tx, desired: &Student) -> ServiceResult<bool> {
    let current = tx
        .load_student(desired.id)
        .await?
        .ok_or(ServiceError::StudentNotFound(desired.id))?;

    if *desired == current {
        debug!(student_id = %desired.id, "student unchanged");
        return Ok(false);
    }
    tx.save_student(desired).await?;
    Ok(true)
}

/// Writes each desired course that differs from the stored one. Every id is
/// checked against the student's courses, and for repeats, before anything is
/// written.
/// Returns the number of writes issued.
pub async fn reconcile_courses(
    tx: &mut dyn Tx,
    desired: &[CourseUpdate],
    student_id: Uuid,
) -> ServiceResult<usize> {
    let current: HashMap<Uuid, Course> = tx
        .load_courses_for_student(student_id)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut seen = HashSet::with_capacity(desired.len());
    if let Some(dup) = desired.iter().find(|d| !seen.insert(d.id)) {
        warn!(course_id = %dup.id, %student_id, "course listed twice in update");
        return Err(ServiceError::InvalidRequest(format!(
            "course {} is listed more than once",
            dup.id
        )));
    }

    let mut pending = Vec::with_capacity(desired.len());
    for d in desired {
        let Some(cur) = current.get(&d.id) else {
            warn!(course_id = %d.id, %student_id, "course not found for student");
            return Err(ServiceError::CourseNotFound {
                course_id: d.id,
                student_id,
            });
        };
        let wanted = Course {
            id: cur.id,
            student_id: cur.student_id,
            course_name: d.course_name.clone(),
            start_date: truncate_to_micros(d.start_date),
            end_date: truncate_to_micros(d.end_date),
            enrollment_status: None,
        };
        if wanted.differs_from(cur) {
            pending.push(wanted);
        }
    }

    for c in &pending {
        tx.save_course(c).await?;
    }
    debug!(%student_id, written = pending.len(), requested = desired.len(), "courses reconciled");
    Ok(pending.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub student_updated: bool,
    pub courses_updated: usize,
}

/// Reconciles the student and then its courses.
pub async fn update(
    tx: &mut dyn Tx,
    desired_student: &Student,
    desired_courses: &[CourseUpdate],
) -> ServiceResult<UpdateOutcome> {
    validation::validate_student(desired_student)?;
    for c in desired_courses {
        validation::validate_course_update(c)?;
    }

    let student_updated = reconcile_student(tx, desired_student).await?;
    let courses_updated = reconcile_courses(tx, desired_courses, desired_student.id).await?;

    info!(
        student_id = %desired_student.id,
        student_updated,
        courses_updated,
        "student update reconciled"
    );
    Ok(UpdateOutcome {
        student_updated,
        courses_updated,
    })
}
