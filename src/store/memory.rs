//! In-memory [`Store`] for tests.
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! staged copy of the tables; `commit` publishes the copy, drop discards it.
//! Timestamps are stored at microsecond precision, as Postgres does.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, Tx};
use crate::enrollment::repo_types::{current_entry, Status, StatusEntry};
use crate::students::repo_types::{truncate_to_micros, Course, Student, StudentFilter};

/// A write that reached the store, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    CreateStudent(Uuid),
    SaveStudent(Uuid),
    CreateCourse(Uuid),
    SaveCourse(Uuid),
    AppendStatus(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub statuses: Vec<StatusEntry>,
    pub journal: Vec<Write>,
    next_seq: i64,
}

impl Tables {
    fn with_current_status(&self, mut course: Course) -> Course {
        let lineage: Vec<StatusEntry> = self
            .statuses
            .iter()
            .filter(|e| e.course_id == course.id)
            .cloned()
            .collect();
        course.enrollment_status = current_entry(&lineage).cloned();
        course
    }

    fn courses_where(&self, pred: impl Fn(&Course) -> bool) -> Vec<Course> {
        let mut out: Vec<Course> = self
            .courses
            .iter()
            .map(|c| self.with_current_status(c.clone()))
            .filter(|c| pred(c))
            .collect();
        out.sort_by_key(|c| (c.start_date, c.id));
        out
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state.
    pub async fn snapshot(&self) -> Tables {
        self.tables.lock().await.clone()
    }

    pub async fn journal(&self) -> Vec<Write> {
        self.tables.lock().await.journal.clone()
    }

    pub async fn clear_journal(&self) {
        self.tables.lock().await.journal.clear();
    }

    /// Mutates committed state directly, outside any transaction.
    pub async fn with_tables(&self, f: impl FnOnce(&mut Tables)) {
        f(&mut *self.tables.lock().await);
    }

    /// Inserts a status entry directly, bypassing the monotonicity rule.
    pub async fn seed_status(&self, entry: StatusEntry) -> StatusEntry {
        let mut t = self.tables.lock().await;
        t.next_seq += 1;
        let stored = StatusEntry {
            seq: t.next_seq,
            created_at: truncate_to_micros(entry.created_at),
            ..entry
        };
        t.statuses.push(stored.clone());
        stored
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn Tx>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx { guard, staged }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl Tx for MemoryTx {
    async fn search_students(&mut self, filter: &StudentFilter) -> anyhow::Result<Vec<Student>> {
        let mut out: Vec<Student> = self
            .staged
            .students
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        out.sort_by(|a, b| (&a.full_name, a.id).cmp(&(&b.full_name, b.id)));
        Ok(out)
    }

    async fn load_student(&mut self, id: Uuid) -> anyhow::Result<Option<Student>> {
        Ok(self.staged.students.iter().find(|s| s.id == id).cloned())
    }

    async fn create_student(&mut self, student: &Student) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.staged.students.iter().any(|s| s.id == student.id),
            "duplicate student id {}",
            student.id
        );
        self.staged.students.push(student.clone());
        self.staged.journal.push(Write::CreateStudent(student.id));
        Ok(())
    }

    async fn save_student(&mut self, student: &Student) -> anyhow::Result<()> {
        let slot = self
            .staged
            .students
            .iter_mut()
            .find(|s| s.id == student.id)
            .with_context(|| format!("update student {}", student.id))?;
        *slot = student.clone();
        self.staged.journal.push(Write::SaveStudent(student.id));
        Ok(())
    }

    async fn load_all_courses(&mut self) -> anyhow::Result<Vec<Course>> {
        Ok(self.staged.courses_where(|_| true))
    }

    async fn load_courses_for_student(&mut self, student_id: Uuid) -> anyhow::Result<Vec<Course>> {
        Ok(self.staged.courses_where(|c| c.student_id == student_id))
    }

    async fn load_courses_with_current_status(
        &mut self,
        status: Status,
    ) -> anyhow::Result<Vec<Course>> {
        Ok(self
            .staged
            .courses_where(|c| c.enrollment_status.as_ref().map(|e| e.status) == Some(status)))
    }

    async fn create_course(&mut self, course: &Course) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.staged.students.iter().any(|s| s.id == course.student_id),
            "course {} references unknown student {}",
            course.id,
            course.student_id
        );
        self.staged.courses.push(Course {
            start_date: truncate_to_micros(course.start_date),
            end_date: truncate_to_micros(course.end_date),
            enrollment_status: None,
            ..course.clone()
        });
        self.staged.journal.push(Write::CreateCourse(course.id));
        Ok(())
    }

    async fn save_course(&mut self, course: &Course) -> anyhow::Result<()> {
        let slot = self
            .staged
            .courses
            .iter_mut()
            .find(|c| c.id == course.id)
            .with_context(|| format!("update course {}", course.id))?;
        slot.course_name = course.course_name.clone();
        slot.start_date = truncate_to_micros(course.start_date);
        slot.end_date = truncate_to_micros(course.end_date);
        self.staged.journal.push(Write::SaveCourse(course.id));
        Ok(())
    }

    async fn lock_status_lineage(&mut self, _course_id: Uuid) -> anyhow::Result<()> {
        // The whole store is already held by this transaction.
        Ok(())
    }

    async fn load_statuses_for_course(
        &mut self,
        course_id: Uuid,
    ) -> anyhow::Result<Vec<StatusEntry>> {
        Ok(self
            .staged
            .statuses
            .iter()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn append_status(&mut self, entry: &StatusEntry) -> anyhow::Result<StatusEntry> {
        anyhow::ensure!(
            self.staged.courses.iter().any(|c| c.id == entry.course_id),
            "status {} references unknown course {}",
            entry.id,
            entry.course_id
        );
        self.staged.next_seq += 1;
        let stored = StatusEntry {
            seq: self.staged.next_seq,
            created_at: truncate_to_micros(entry.created_at),
            ..entry.clone()
        };
        self.staged.statuses.push(stored.clone());
        self.staged.journal.push(Write::AppendStatus(stored.id));
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        let MemoryTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
