use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::repo_types::{current_entry, Status, StatusEntry};
use crate::error::{ServiceError, ServiceResult};
use crate::store::Tx;
use crate::students::repo_types::truncate_to_micros;

/// Appends `requested` to the course's status history.
///
/// The course must already have at least one entry, and `requested` must rank
/// strictly above the current one. Prior entries are never touched.
pub async fn advance(
    tx: &mut dyn Tx,
    course_id: Uuid,
    requested: Status,
) -> ServiceResult<StatusEntry> {
    tx.lock_status_lineage(course_id).await?;

    let lineage = tx.load_statuses_for_course(course_id).await?;
    let Some(current) = current_entry(&lineage) else {
        warn!(%course_id, "no status lineage for course");
        return Err(ServiceError::StatusLineageNotFound(course_id));
    };

    if requested.rank() <= current.status.rank() {
        warn!(%course_id, current = %current.status, %requested, "rejected status transition");
        return Err(ServiceError::NonMonotonicTransition {
            current: current.status,
            requested,
        });
    }

    // Never stamp earlier than the entry we are superseding.
    let created_at = truncate_to_micros(OffsetDateTime::now_utc()).max(current.created_at);
    let entry = tx
        .append_status(&StatusEntry::new(course_id, requested, created_at))
        .await?;

    debug!(%course_id, entries = lineage.len() + 1, "status lineage extended");
    info!(%course_id, from = %current.status, to = %entry.status, "enrollment status advanced");
    Ok(entry)
}

/// Full history of a course, oldest first.
pub async fn history(tx: &mut dyn Tx, course_id: Uuid) -> ServiceResult<Vec<StatusEntry>> {
    let mut lineage = tx.load_statuses_for_course(course_id).await?;
    if lineage.is_empty() {
        return Err(ServiceError::StatusLineageNotFound(course_id));
    }
    lineage.sort_by_key(|e| (e.created_at, e.seq));
    Ok(lineage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::Store;
    use crate::students::repo_types::Course;
    use time::macros::datetime;

    /// A store holding one course whose lineage starts at `initial`.
    async fn store_with_course(initial: Option<Status>) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let course_id = Uuid::new_v4();
        let student_id = Uuid::new_v4();
        store
            .with_tables(|t| {
                t.courses.push(Course {
                    id: course_id,
                    student_id,
                    course_name: "Rust basics".into(),
                    start_date: datetime!(2024-04-01 0:00 UTC),
                    end_date: datetime!(2025-04-01 0:00 UTC),
                    enrollment_status: None,
                })
            })
            .await;
        if let Some(status) = initial {
            store
                .seed_status(StatusEntry::new(
                    course_id,
                    status,
                    datetime!(2024-04-01 0:00 UTC),
                ))
                .await;
        }
        (store, course_id)
    }

    async fn advance_committed(
        store: &MemoryStore,
        course_id: Uuid,
        requested: Status,
    ) -> ServiceResult<StatusEntry> {
        let mut tx = store.begin().await?;
        let entry = advance(tx.as_mut(), course_id, requested).await?;
        tx.commit().await?;
        Ok(entry)
    }

    #[tokio::test]
    async fn advance_succeeds_iff_requested_ranks_higher() {
        for current in Status::ALL {
            for requested in Status::ALL {
                let (store, course_id) = store_with_course(Some(current)).await;
                let result = advance_committed(&store, course_id, requested).await;
                if requested.rank() > current.rank() {
                    let entry = result.expect("forward transition should succeed");
                    assert_eq!(entry.status, requested);
                    assert_eq!(entry.course_id, course_id);
                } else {
                    match result {
                        Err(ServiceError::NonMonotonicTransition {
                            current: c,
                            requested: r,
                        }) => {
                            assert_eq!(c, current);
                            assert_eq!(r, requested);
                        }
                        other => panic!("{current} -> {requested}: unexpected {other:?}"),
                    }
                    assert_eq!(store.snapshot().await.statuses.len(), 1);
                }
            }
        }
    }

    #[tokio::test]
    async fn history_is_append_only_and_current_tracks_last_advance() {
        let (store, course_id) = store_with_course(Some(Status::Pending)).await;
        let before = store.snapshot().await.statuses;

        for requested in [Status::Approved, Status::InProgress, Status::Completed] {
            advance_committed(&store, course_id, requested).await.unwrap();
        }

        let statuses = store.snapshot().await.statuses;
        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0], before[0]);
        assert!(statuses.iter().all(|e| e.created_at.nanosecond() % 1_000 == 0));
        assert_eq!(current_entry(&statuses).unwrap().status, Status::Completed);

        let mut tx = store.begin().await.unwrap();
        let ordered: Vec<Status> = history(tx.as_mut(), course_id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(ordered, Status::ALL.to_vec());
    }

    #[tokio::test]
    async fn missing_lineage_is_reported_for_every_status() {
        let (store, course_id) = store_with_course(None).await;
        for requested in Status::ALL {
            let err = advance_committed(&store, course_id, requested)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::StatusLineageNotFound(id) if id == course_id));
        }

        let unknown = Uuid::new_v4();
        let err = advance_committed(&store, unknown, Status::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StatusLineageNotFound(id) if id == unknown));
        assert!(store.journal().await.is_empty());
    }

    #[tokio::test]
    async fn pending_to_approved_then_back_to_pending_is_rejected() {
        let (store, course_id) = store_with_course(Some(Status::Pending)).await;

        let approved = advance_committed(&store, course_id, Status::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, Status::Approved);
        assert!(approved.created_at > datetime!(2024-04-01 0:00 UTC));

        let err = advance_committed(&store, course_id, Status::Pending)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("current: APPROVED"));
    }

    #[tokio::test]
    async fn appended_entry_stays_current_when_existing_entry_is_in_the_future() {
        let (store, course_id) = store_with_course(None).await;
        let future = truncate_to_micros(OffsetDateTime::now_utc() + time::Duration::days(1));
        store
            .seed_status(StatusEntry::new(course_id, Status::Pending, future))
            .await;

        let entry = advance_committed(&store, course_id, Status::Approved)
            .await
            .unwrap();
        assert_eq!(entry.created_at, future);

        let statuses = store.snapshot().await.statuses;
        assert_eq!(current_entry(&statuses).unwrap().id, entry.id);
    }
}
