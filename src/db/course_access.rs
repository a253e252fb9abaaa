use crate::core::AppError;
use crate::models::course_access::{CourseAccess, CourseNote, PendingCourseRequest};
use sqlx::PgPool;
use uuid::Uuid;

const ACCESS_COLUMNS: &str = r#"
    id, user_id, course_id, status, requested_at, reviewed_at, reviewed_by,
    rejection_reason, completed_at, progress, updated_at
"#;

// Submit (or re-open) a course request
pub async fn submit(pool: &PgPool, user_id: Uuid, course_id: i32) -> Result<CourseAccess, AppError> {
    // Only a rejected row is touched on conflict; every other status is left
    // as is and read back below.
    let query = format!(
        r#"
        INSERT INTO course_access (user_id, course_id, status)
        VALUES ($1, $2, 'requested')
        ON CONFLICT (user_id, course_id) DO UPDATE
        SET status = 'requested',
            requested_at = now(),
            reviewed_at = NULL,
            reviewed_by = NULL,
            rejection_reason = NULL,
            updated_at = now()
        WHERE course_access.status = 'rejected'
        RETURNING {}
        "#,
        ACCESS_COLUMNS
    );

    let upserted = sqlx::query_as::<_, CourseAccess>(&query)
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)?;

    match upserted {
        Some(row) => Ok(row),
        None => find(pool, user_id, course_id)
            .await?
            .ok_or_else(|| AppError::internal_error("Course request vanished after upsert")),
    }
}

pub async fn find(
    pool: &PgPool,
    user_id: Uuid,
    course_id: i32,
) -> Result<Option<CourseAccess>, AppError> {
    let query = format!(
        "SELECT {} FROM course_access WHERE user_id = $1 AND course_id = $2",
        ACCESS_COLUMNS
    );
    sqlx::query_as::<_, CourseAccess>(&query)
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn find_by_id(pool: &PgPool, access_id: Uuid) -> Result<Option<CourseAccess>, AppError> {
    let query = format!("SELECT {} FROM course_access WHERE id = $1", ACCESS_COLUMNS);
    sqlx::query_as::<_, CourseAccess>(&query)
        .bind(access_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<CourseAccess>, AppError> {
    let query = format!(
        "SELECT {} FROM course_access WHERE user_id = $1 ORDER BY course_id",
        ACCESS_COLUMNS
    );
    sqlx::query_as::<_, CourseAccess>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)
}

/// Marks an approved (or already completed) course as completed. `None`
/// means the row was missing or not in a consumable state.
pub async fn complete(
    pool: &PgPool,
    user_id: Uuid,
    course_id: i32,
) -> Result<Option<CourseAccess>, AppError> {
    let query = format!(
        r#"
        UPDATE course_access
        SET status = 'completed',
            progress = 100,
            completed_at = COALESCE(completed_at, now()),
            updated_at = now()
        WHERE user_id = $1 AND course_id = $2
          AND status IN ('approved', 'completed')
        RETURNING {}
        "#,
        ACCESS_COLUMNS
    );
    sqlx::query_as::<_, CourseAccess>(&query)
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn update_progress(
    pool: &PgPool,
    user_id: Uuid,
    course_id: i32,
    progress: i32,
) -> Result<Option<CourseAccess>, AppError> {
    let query = format!(
        r#"
        UPDATE course_access
        SET progress = CASE WHEN status = 'completed' THEN 100 ELSE $3 END,
            updated_at = now()
        WHERE user_id = $1 AND course_id = $2
          AND status IN ('approved', 'completed')
        RETURNING {}
        "#,
        ACCESS_COLUMNS
    );
    sqlx::query_as::<_, CourseAccess>(&query)
        .bind(user_id)
        .bind(course_id)
        .bind(progress)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn get_note(
    pool: &PgPool,
    user_id: Uuid,
    course_id: i32,
) -> Result<Option<CourseNote>, AppError> {
    sqlx::query_as::<_, CourseNote>(
        r#"
        SELECT course_id, content, updated_at
        FROM course_notes
        WHERE user_id = $1 AND course_id = $2
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)
}

pub async fn upsert_note(
    pool: &PgPool,
    user_id: Uuid,
    course_id: i32,
    content: &str,
) -> Result<CourseNote, AppError> {
    sqlx::query_as::<_, CourseNote>(
        r#"
        INSERT INTO course_notes (user_id, course_id, content)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, course_id) DO UPDATE
        SET content = EXCLUDED.content, updated_at = now()
        RETURNING course_id, content, updated_at
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(content)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)
}

// Pending queue, optionally scoped to one leader's students and/or one user
pub async fn list_pending(
    pool: &PgPool,
    leader_scope: Option<Uuid>,
    user_filter: Option<Uuid>,
) -> Result<Vec<PendingCourseRequest>, AppError> {
    sqlx::query_as::<_, PendingCourseRequest>(
        r#"
        SELECT ca.id, ca.user_id, p.email, p.display_name, ca.course_id, ca.requested_at
        FROM course_access ca
        JOIN system_profiles p ON p.id = ca.user_id
        WHERE ca.status = 'requested'
          AND ($1::uuid IS NULL OR p.leader_id = $1)
          AND ($2::uuid IS NULL OR ca.user_id = $2)
        ORDER BY ca.requested_at ASC
        "#,
    )
    .bind(leader_scope)
    .bind(user_filter)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error_verbose)
}
