//! Ledger transitions driven by reviewers. Each function is one statement;
//! the caller decides what to notify afterwards.

use crate::core::AppError;
use crate::models::course_access::CourseAccess;
use crate::models::review::{CourseReviewItem, FileReviewItem, ReviewAction};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn review_single_course(
    pool: &PgPool,
    access_id: Uuid,
    action: ReviewAction,
    rejection_reason: Option<&str>,
    reviewer: Uuid,
) -> Result<Option<CourseAccess>, AppError> {
    sqlx::query_as::<_, CourseAccess>(
        r#"
        UPDATE course_access
        SET status = $2,
            reviewed_at = now(),
            reviewed_by = $3,
            rejection_reason = $4,
            updated_at = now()
        WHERE id = $1 AND status <> 'completed'
        RETURNING id, user_id, course_id, status, requested_at, reviewed_at, reviewed_by,
                  rejection_reason, completed_at, progress, updated_at
        "#,
    )
    .bind(access_id)
    .bind(action.target_status())
    .bind(reviewer)
    .bind(rejection_reason)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)
}

/// Upserts every (user, course) pair to the reviewed status. Completed rows
/// are left alone. Returns the pairs that actually changed.
pub async fn bulk_review_courses(
    pool: &PgPool,
    items: &[CourseReviewItem],
    action: ReviewAction,
    rejection_reason: Option<&str>,
    reviewer: Uuid,
) -> Result<Vec<(Uuid, i32)>, AppError> {
    let user_ids: Vec<Uuid> = items.iter().map(|item| item.user_id).collect();
    let course_ids: Vec<i32> = items.iter().map(|item| item.course_id).collect();

    sqlx::query_as::<_, (Uuid, i32)>(
        r#"
        INSERT INTO course_access
            (user_id, course_id, status, reviewed_at, reviewed_by, rejection_reason)
        SELECT t.user_id, t.course_id, $3, now(), $4, $5
        FROM UNNEST($1::uuid[], $2::int4[]) AS t(user_id, course_id)
        ON CONFLICT (user_id, course_id) DO UPDATE
        SET status = EXCLUDED.status,
            reviewed_at = EXCLUDED.reviewed_at,
            reviewed_by = EXCLUDED.reviewed_by,
            rejection_reason = EXCLUDED.rejection_reason,
            updated_at = now()
        WHERE course_access.status <> 'completed'
        RETURNING user_id, course_id
        "#,
    )
    .bind(&user_ids)
    .bind(&course_ids)
    .bind(action.target_status())
    .bind(reviewer)
    .bind(rejection_reason)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

/// Approves every `requested` row that matches the optional filters.
pub async fn approve_course_range(
    pool: &PgPool,
    user_id: Option<Uuid>,
    from_course_id: Option<i32>,
    to_course_id: Option<i32>,
    reviewer: Uuid,
) -> Result<Vec<(Uuid, i32)>, AppError> {
    sqlx::query_as::<_, (Uuid, i32)>(
        r#"
        UPDATE course_access
        SET status = 'approved',
            reviewed_at = now(),
            reviewed_by = $4,
            rejection_reason = NULL,
            updated_at = now()
        WHERE status = 'requested'
          AND ($1::uuid IS NULL OR user_id = $1)
          AND ($2::int4 IS NULL OR course_id >= $2)
          AND ($3::int4 IS NULL OR course_id <= $3)
        RETURNING user_id, course_id
        "#,
    )
    .bind(user_id)
    .bind(from_course_id)
    .bind(to_course_id)
    .bind(reviewer)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

fn split_file_items(items: &[FileReviewItem]) -> (Vec<Uuid>, Vec<Uuid>) {
    items.iter().map(|item| (item.user_id, item.file_id)).unzip()
}

/// Upserts the grant rows. Returns how many rows were written.
pub async fn grant_file_permissions(
    pool: &PgPool,
    items: &[FileReviewItem],
    granted_by: Uuid,
) -> Result<u64, AppError> {
    let (user_ids, file_ids) = split_file_items(items);

    let result = sqlx::query(
        r#"
        INSERT INTO file_permissions (user_id, file_id, granted_by)
        SELECT t.user_id, t.file_id, $3
        FROM UNNEST($1::uuid[], $2::uuid[]) AS t(user_id, file_id)
        ON CONFLICT (user_id, file_id) DO UPDATE
        SET granted_by = EXCLUDED.granted_by
        "#,
    )
    .bind(&user_ids)
    .bind(&file_ids)
    .bind(granted_by)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}

pub async fn revoke_file_permissions(
    pool: &PgPool,
    items: &[FileReviewItem],
) -> Result<u64, AppError> {
    let (user_ids, file_ids) = split_file_items(items);

    let result = sqlx::query(
        r#"
        DELETE FROM file_permissions fp
        USING UNNEST($1::uuid[], $2::uuid[]) AS t(user_id, file_id)
        WHERE fp.user_id = t.user_id AND fp.file_id = t.file_id
        "#,
    )
    .bind(&user_ids)
    .bind(&file_ids)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}

pub async fn bulk_review_files(
    pool: &PgPool,
    items: &[FileReviewItem],
    action: ReviewAction,
    rejection_reason: Option<&str>,
    reviewer: Uuid,
) -> Result<Vec<(Uuid, Uuid)>, AppError> {
    let (user_ids, file_ids) = split_file_items(items);

    sqlx::query_as::<_, (Uuid, Uuid)>(
        r#"
        INSERT INTO file_access_requests
            (user_id, file_id, status, reviewed_at, reviewed_by, rejection_reason)
        SELECT t.user_id, t.file_id, $3, now(), $4, $5
        FROM UNNEST($1::uuid[], $2::uuid[]) AS t(user_id, file_id)
        ON CONFLICT (user_id, file_id) DO UPDATE
        SET status = EXCLUDED.status,
            reviewed_at = EXCLUDED.reviewed_at,
            reviewed_by = EXCLUDED.reviewed_by,
            rejection_reason = EXCLUDED.rejection_reason
        RETURNING user_id, file_id
        "#,
    )
    .bind(&user_ids)
    .bind(&file_ids)
    .bind(action.target_status())
    .bind(reviewer)
    .bind(rejection_reason)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}
