use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Store, Tx};
use crate::enrollment::repo_types::{Status, StatusEntry};
use crate::students::repo_types::{Course, Student, StudentFilter};

/// Courses joined with their current status entry, if any.
const COURSE_SELECT: &str = r#"
    SELECT c.id, c.student_id, c.course_name, c.start_date, c.end_date,
           s.id AS status_id, s.status, s.created_at AS status_created_at, s.seq AS status_seq
      FROM student_courses c
      LEFT JOIN LATERAL (
            SELECT id, status, created_at, seq
              FROM enrollment_statuses
             WHERE course_id = c.id
             ORDER BY created_at DESC, seq DESC
             LIMIT 1
      ) s ON TRUE
"#;

#[derive(Debug, FromRow)]
struct CourseRow {
    id: Uuid,
    student_id: Uuid,
    course_name: String,
    start_date: OffsetDateTime,
    end_date: OffsetDateTime,
    status_id: Option<Uuid>,
    status: Option<Status>,
    status_created_at: Option<OffsetDateTime>,
    status_seq: Option<i64>,
}

impl From<CourseRow> for Course {
    fn from(r: CourseRow) -> Self {
        let enrollment_status = match (r.status_id, r.status, r.status_created_at, r.status_seq) {
            (Some(id), Some(status), Some(created_at), Some(seq)) => Some(StatusEntry {
                id,
                course_id: r.id,
                status,
                created_at,
                seq,
            }),
            _ => None,
        };
        Self {
            id: r.id,
            student_id: r.student_id,
            course_name: r.course_name,
            start_date: r.start_date,
            end_date: r.end_date,
            enrollment_status,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn Tx>> {
        let tx = self.pool.begin().await.context("begin tx")?;
        Ok(Box::new(PgTx { tx }))
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// `%needle%` with LIKE metacharacters in `needle` escaped by `\`.
fn contains_pattern(needle: Option<&str>) -> Option<String> {
    needle.map(|n| {
        let mut pattern = String::with_capacity(n.len() + 2);
        pattern.push('%');
        for ch in n.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    })
}

fn course_query(predicate: &str) -> String {
    format!("{COURSE_SELECT} {predicate} ORDER BY c.start_date, c.id")
}

#[async_trait]
impl Tx for PgTx {
    async fn search_students(&mut self, filter: &StudentFilter) -> anyhow::Result<Vec<Student>> {
        let rows = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, full_name, kana, nick_name, email, city, age, gender, remark, is_deleted
              FROM students
             WHERE is_deleted = FALSE
               AND ($1::text IS NULL OR full_name ILIKE $1 ESCAPE '\')
               AND ($2::text IS NULL OR kana      ILIKE $2 ESCAPE '\')
               AND ($3::text IS NULL OR nick_name ILIKE $3 ESCAPE '\')
               AND ($4::text IS NULL OR email     ILIKE $4 ESCAPE '\')
               AND ($5::text IS NULL OR city      ILIKE $5 ESCAPE '\')
               AND ($6::int  IS NULL OR age >= $6)
               AND ($7::int  IS NULL OR age <= $7)
               AND ($8::gender IS NULL OR gender = $8)
               AND ($9::text IS NULL OR remark    ILIKE $9 ESCAPE '\')
             ORDER BY full_name, id
            "#,
        )
        .bind(contains_pattern(filter.full_name.as_deref()))
        .bind(contains_pattern(filter.kana.as_deref()))
        .bind(contains_pattern(filter.nick_name.as_deref()))
        .bind(contains_pattern(filter.email.as_deref()))
        .bind(contains_pattern(filter.city.as_deref()))
        .bind(filter.min_age)
        .bind(filter.max_age)
        .bind(filter.gender)
        .bind(contains_pattern(filter.remark.as_deref()))
        .fetch_all(&mut *self.tx)
        .await
        .context("search students")?;
        Ok(rows)
    }

    async fn load_student(&mut self, id: Uuid) -> anyhow::Result<Option<Student>> {
        let row = sqlx::query_as::<_, Student>(
            r#"
            SELECT id, full_name, kana, nick_name, email, city, age, gender, remark, is_deleted
              FROM students
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("load student")?;
        Ok(row)
    }

    async fn create_student(&mut self, s: &Student) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students
                (id, full_name, kana, nick_name, email, city, age, gender, remark, is_deleted)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(s.id)
        .bind(&s.full_name)
        .bind(&s.kana)
        .bind(&s.nick_name)
        .bind(&s.email)
        .bind(&s.city)
        .bind(s.age)
        .bind(s.gender)
        .bind(&s.remark)
        .bind(s.is_deleted)
        .execute(&mut *self.tx)
        .await
        .context("insert student")?;
        Ok(())
    }

    async fn save_student(&mut self, s: &Student) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE students
               SET full_name = $2, kana = $3, nick_name = $4, email = $5, city = $6,
                   age = $7, gender = $8, remark = $9, is_deleted = $10
             WHERE id = $1
            "#,
        )
        .bind(s.id)
        .bind(&s.full_name)
        .bind(&s.kana)
        .bind(&s.nick_name)
        .bind(&s.email)
        .bind(&s.city)
        .bind(s.age)
        .bind(s.gender)
        .bind(&s.remark)
        .bind(s.is_deleted)
        .execute(&mut *self.tx)
        .await
        .context("update student")?;
        Ok(())
    }

    async fn load_all_courses(&mut self) -> anyhow::Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(&course_query(""))
            .fetch_all(&mut *self.tx)
            .await
            .context("load all courses")?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn load_courses_for_student(&mut self, student_id: Uuid) -> anyhow::Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(&course_query("WHERE c.student_id = $1"))
            .bind(student_id)
            .fetch_all(&mut *self.tx)
            .await
            .context("load courses for student")?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn load_courses_with_current_status(
        &mut self,
        status: Status,
    ) -> anyhow::Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, CourseRow>(&course_query("WHERE s.status = $1"))
            .bind(status)
            .fetch_all(&mut *self.tx)
            .await
            .context("load courses by current status")?;
        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn create_course(&mut self, c: &Course) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO student_courses (id, student_id, course_name, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(c.id)
        .bind(c.student_id)
        .bind(&c.course_name)
        .bind(c.start_date)
        .bind(c.end_date)
        .execute(&mut *self.tx)
        .await
        .context("insert course")?;
        Ok(())
    }

    async fn save_course(&mut self, c: &Course) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE student_courses
               SET course_name = $2, start_date = $3, end_date = $4
             WHERE id = $1
            "#,
        )
        .bind(c.id)
        .bind(&c.course_name)
        .bind(c.start_date)
        .bind(c.end_date)
        .execute(&mut *self.tx)
        .await
        .context("update course")?;
        Ok(())
    }

    async fn lock_status_lineage(&mut self, course_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("SELECT id FROM student_courses WHERE id = $1 FOR UPDATE")
            .bind(course_id)
            .fetch_optional(&mut *self.tx)
            .await
            .context("lock course row")?;
        Ok(())
    }

    async fn load_statuses_for_course(
        &mut self,
        course_id: Uuid,
    ) -> anyhow::Result<Vec<StatusEntry>> {
        let rows = sqlx::query_as::<_, StatusEntry>(
            r#"
            SELECT id, course_id, status, created_at, seq
              FROM enrollment_statuses
             WHERE course_id = $1
             ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&mut *self.tx)
        .await
        .context("load status lineage")?;
        Ok(rows)
    }

    async fn append_status(&mut self, e: &StatusEntry) -> anyhow::Result<StatusEntry> {
        let row = sqlx::query_as::<_, StatusEntry>(
            r#"
            INSERT INTO enrollment_statuses (id, course_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, course_id, status, created_at, seq
            "#,
        )
        .bind(e.id)
        .bind(e.course_id)
        .bind(e.status)
        .bind(e.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .context("insert enrollment status")?;
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await.context("commit tx")?;
        Ok(())
    }
}
