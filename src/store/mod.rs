//! Persistence seam between the services and the database.
//!
//! Every request runs against one [`Tx`]. Dropping a `Tx` without calling
//! [`Tx::commit`] discards all of its writes.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::enrollment::repo_types::{Status, StatusEntry};
use crate::students::repo_types::{Course, Student, StudentFilter};

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn Tx>>;
}

/// Operations available inside one transaction.
///
/// Course loads attach each course's current status entry.
#[async_trait]
pub trait Tx: Send {
    async fn search_students(&mut self, filter: &StudentFilter) -> anyhow::Result<Vec<Student>>;
    async fn load_student(&mut self, id: Uuid) -> anyhow::Result<Option<Student>>;
    async fn create_student(&mut self, student: &Student) -> anyhow::Result<()>;
    /// Replaces the whole record.
    async fn save_student(&mut self, student: &Student) -> anyhow::Result<()>;

    async fn load_all_courses(&mut self) -> anyhow::Result<Vec<Course>>;
    async fn load_courses_for_student(&mut self, student_id: Uuid) -> anyhow::Result<Vec<Course>>;
    async fn load_courses_with_current_status(
        &mut self,
        status: Status,
    ) -> anyhow::Result<Vec<Course>>;
    async fn create_course(&mut self, course: &Course) -> anyhow::Result<()>;
    /// Writes name and dates; id and student id are never rewritten.
    async fn save_course(&mut self, course: &Course) -> anyhow::Result<()>;

    /// Serializes status appends for one course until the transaction ends.
    async fn lock_status_lineage(&mut self, course_id: Uuid) -> anyhow::Result<()>;
    async fn load_statuses_for_course(&mut self, course_id: Uuid)
        -> anyhow::Result<Vec<StatusEntry>>;
    /// Inserts the entry and returns it with its assigned sequence number.
    async fn append_status(&mut self, entry: &StatusEntry) -> anyhow::Result<StatusEntry>;

    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
}
