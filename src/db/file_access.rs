use crate::core::AppError;
use crate::models::file_access::{
    FileAccessRequest, FileRequestStatus, FileWithAccess, PendingFileRequest, SystemFile,
};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

const REQUEST_COLUMNS: &str = r#"
    id, user_id, file_id, status, requested_at, reviewed_at, reviewed_by, rejection_reason
"#;

pub async fn find_file(pool: &PgPool, file_id: Uuid) -> Result<Option<SystemFile>, AppError> {
    sqlx::query_as::<_, SystemFile>(
        "SELECT id, title, storage_path, created_at FROM system_files WHERE id = $1",
    )
    .bind(file_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)
}

/// Every file, with the caller's permission and request status attached.
pub async fn list_files_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<FileWithAccess>, AppError> {
    sqlx::query_as::<_, FileWithAccess>(
        r#"
        SELECT f.id, f.title, f.created_at,
               (fp.id IS NOT NULL) AS permitted,
               r.status AS request_status
        FROM system_files f
        LEFT JOIN file_permissions fp ON fp.file_id = f.id AND fp.user_id = $1
        LEFT JOIN file_access_requests r ON r.file_id = f.id AND r.user_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

// Submit (or re-open) a file request
pub async fn submit(
    pool: &PgPool,
    user_id: Uuid,
    file_id: Uuid,
) -> Result<FileAccessRequest, AppError> {
    let query = format!(
        r#"
        INSERT INTO file_access_requests (user_id, file_id, status)
        VALUES ($1, $2, 'requested')
        ON CONFLICT (user_id, file_id) DO UPDATE
        SET status = 'requested',
            requested_at = now(),
            reviewed_at = NULL,
            reviewed_by = NULL,
            rejection_reason = NULL
        WHERE file_access_requests.status = 'rejected'
        RETURNING {}
        "#,
        REQUEST_COLUMNS
    );

    let upserted = sqlx::query_as::<_, FileAccessRequest>(&query)
        .bind(user_id)
        .bind(file_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)?;

    if let Some(row) = upserted {
        return Ok(row);
    }

    let query = format!(
        "SELECT {} FROM file_access_requests WHERE user_id = $1 AND file_id = $2",
        REQUEST_COLUMNS
    );
    sqlx::query_as::<_, FileAccessRequest>(&query)
        .bind(user_id)
        .bind(file_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<FileAccessRequest>, AppError> {
    let query = format!(
        "SELECT {} FROM file_access_requests WHERE user_id = $1 ORDER BY requested_at DESC",
        REQUEST_COLUMNS
    );
    sqlx::query_as::<_, FileAccessRequest>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error)
}

/// Whether a permission row exists, plus the request status if any.
pub async fn gate_state(
    pool: &PgPool,
    user_id: Uuid,
    file_id: Uuid,
) -> Result<(bool, Option<FileRequestStatus>), AppError> {
    sqlx::query_as::<_, (bool, Option<FileRequestStatus>)>(
        r#"
        SELECT
            EXISTS (
                SELECT 1 FROM file_permissions WHERE user_id = $1 AND file_id = $2
            ) AS permitted,
            (
                SELECT status FROM file_access_requests WHERE user_id = $1 AND file_id = $2
            ) AS request_status
        "#,
    )
    .bind(user_id)
    .bind(file_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)
}

pub async fn list_pending(
    pool: &PgPool,
    leader_scope: Option<Uuid>,
    user_filter: Option<Uuid>,
) -> Result<Vec<PendingFileRequest>, AppError> {
    sqlx::query_as::<_, PendingFileRequest>(
        r#"
        SELECT r.id, r.user_id, p.email, p.display_name, r.file_id,
               f.title AS file_title, r.requested_at
        FROM file_access_requests r
        JOIN system_profiles p ON p.id = r.user_id
        JOIN system_files f ON f.id = r.file_id
        WHERE r.status = 'requested'
          AND ($1::uuid IS NULL OR p.leader_id = $1)
          AND ($2::uuid IS NULL OR r.user_id = $2)
        ORDER BY r.requested_at ASC
        "#,
    )
    .bind(leader_scope)
    .bind(user_filter)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error_verbose)
}

pub async fn file_titles(
    pool: &PgPool,
    file_ids: &[Uuid],
) -> Result<HashMap<Uuid, String>, AppError> {
    let rows = sqlx::query_as::<_, (Uuid, String)>(
        "SELECT id, title FROM system_files WHERE id = ANY($1)",
    )
    .bind(file_ids)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(rows.into_iter().collect())
}
