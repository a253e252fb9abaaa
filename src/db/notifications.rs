use crate::core::{AppError, AppErrorType};
use crate::models::notifications::{NewNotification, Notification, LIST_LIMIT};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Inserts the whole batch in one statement. Failures surface as
/// `NOTIFY_FAILED` so callers can tell them apart from the ledger write.
pub async fn insert_many(pool: &PgPool, batch: &[NewNotification]) -> Result<u64, AppError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO notifications (to_user_id, from_user_id, title, content) ");
    builder.push_values(batch, |mut row, notification| {
        row.push_bind(notification.to_user_id)
            .push_bind(notification.from_user_id)
            .push_bind(&notification.title)
            .push_bind(&notification.content);
    });

    let result = builder
        .build()
        .execute(pool)
        .await
        .map_err(|e| AppError::with_cause(AppErrorType::NotifyFailed, e))?;

    Ok(result.rows_affected())
}

pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Notification>, AppError> {
    sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, to_user_id, from_user_id, title, content, read_at, created_at
        FROM notifications
        WHERE to_user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(LIST_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error)
}

/// Marks one notification read if it belongs to `user_id`. The first
/// `read_at` is kept.
pub async fn mark_read(pool: &PgPool, user_id: Uuid, notification_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET read_at = COALESCE(read_at, now())
        WHERE id = $1 AND to_user_id = $2
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = now() WHERE to_user_id = $1 AND read_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}
