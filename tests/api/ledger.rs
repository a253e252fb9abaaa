use crate::helpers::{seed_file, seed_user};
use sqlx::PgPool;
use trading_portal::db::{course_access, file_access, review};
use trading_portal::models::course_access::AccessStatus;
use trading_portal::models::file_access::FileRequestStatus;
use trading_portal::models::review::{CourseReviewItem, ReviewAction};

async fn course_rows(pool: &PgPool, user_id: uuid::Uuid, course_id: i32) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM course_access WHERE user_id = $1 AND course_id = $2")
        .bind(user_id)
        .bind(course_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count course rows")
}

#[sqlx::test]
async fn first_submit_creates_an_unreviewed_request(pool: PgPool) {
    let student = seed_user(&pool, "first@example.com", "student", None).await;

    let row = course_access::submit(&pool, student, 3).await.unwrap();

    assert_eq!(row.status, AccessStatus::Requested);
    assert_eq!(row.reviewed_by, None);
    assert_eq!(row.reviewed_at, None);
    assert_eq!(row.rejection_reason, None);
}

#[sqlx::test]
async fn repeated_submit_leaves_the_row_untouched(pool: PgPool) {
    let student = seed_user(&pool, "twice@example.com", "student", None).await;

    let first = course_access::submit(&pool, student, 3).await.unwrap();
    let second = course_access::submit(&pool, student, 3).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.status, AccessStatus::Requested);
    assert_eq!(second.requested_at, first.requested_at);
    assert_eq!(second.updated_at, first.updated_at);
    assert_eq!(course_rows(&pool, student, 3).await, 1);
}

#[sqlx::test]
async fn submit_does_not_reopen_an_approved_course(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let student = seed_user(&pool, "approved@example.com", "student", None).await;
    let row = course_access::submit(&pool, student, 4).await.unwrap();
    review::review_single_course(&pool, row.id, ReviewAction::Approve, None, admin)
        .await
        .unwrap();

    let again = course_access::submit(&pool, student, 4).await.unwrap();

    assert_eq!(again.status, AccessStatus::Approved);
    assert_eq!(again.reviewed_by, Some(admin));
}

#[sqlx::test]
async fn resubmitting_a_rejected_course_clears_the_review(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let student = seed_user(&pool, "rejected@example.com", "student", None).await;
    let row = course_access::submit(&pool, student, 6).await.unwrap();
    let rejected = review::review_single_course(
        &pool,
        row.id,
        ReviewAction::Reject,
        Some("资料不全"),
        admin,
    )
    .await
    .unwrap()
    .expect("requested row should be reviewable");
    assert_eq!(rejected.status, AccessStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("资料不全"));

    let reopened = course_access::submit(&pool, student, 6).await.unwrap();

    assert_eq!(reopened.id, row.id);
    assert_eq!(reopened.status, AccessStatus::Requested);
    assert_eq!(reopened.rejection_reason, None);
    assert_eq!(reopened.reviewed_by, None);
    assert_eq!(reopened.reviewed_at, None);
}

#[sqlx::test]
async fn bulk_review_skips_completed_courses(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let student = seed_user(&pool, "done@example.com", "student", None).await;
    let item = CourseReviewItem {
        user_id: student,
        course_id: 2,
    };
    review::bulk_review_courses(&pool, &[item], ReviewAction::Approve, None, admin)
        .await
        .unwrap();
    course_access::complete(&pool, student, 2)
        .await
        .unwrap()
        .expect("approved course should complete");

    let changed = review::bulk_review_courses(
        &pool,
        &[item],
        ReviewAction::Reject,
        Some("late"),
        admin,
    )
    .await
    .unwrap();

    assert!(changed.is_empty());
    let row = course_access::find(&pool, student, 2).await.unwrap().unwrap();
    assert_eq!(row.status, AccessStatus::Completed);
    assert_eq!(row.progress, 100);
}

#[sqlx::test]
async fn progress_needs_an_approved_course(pool: PgPool) {
    let student = seed_user(&pool, "progress@example.com", "student", None).await;
    course_access::submit(&pool, student, 8).await.unwrap();

    let updated = course_access::update_progress(&pool, student, 8, 40).await.unwrap();

    assert!(updated.is_none());
}

#[sqlx::test]
async fn file_submit_is_idempotent_and_reopens_after_rejection(pool: PgPool) {
    let admin = seed_user(&pool, "admin@example.com", "admin", None).await;
    let student = seed_user(&pool, "files@example.com", "student", None).await;
    let file_id = seed_file(&pool, "Candlestick basics").await;

    let first = file_access::submit(&pool, student, file_id).await.unwrap();
    let second = file_access::submit(&pool, student, file_id).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.requested_at, first.requested_at);
    assert_eq!(second.status, FileRequestStatus::Requested);

    let item = trading_portal::models::review::FileReviewItem {
        user_id: student,
        file_id,
    };
    review::bulk_review_files(&pool, &[item], ReviewAction::Reject, Some("不适用"), admin)
        .await
        .unwrap();

    let reopened = file_access::submit(&pool, student, file_id).await.unwrap();
    assert_eq!(reopened.id, first.id);
    assert_eq!(reopened.status, FileRequestStatus::Requested);
    assert_eq!(reopened.rejection_reason, None);
    assert_eq!(reopened.reviewed_by, None);
}
