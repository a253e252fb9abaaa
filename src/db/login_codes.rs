use crate::core::AppError;
use crate::models::login_codes::{LoginCode, Reservation};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert_code(
    pool: &PgPool,
    qualified_identifier: &str,
    code_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO system_login_codes (identifier, code_hash, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(qualified_identifier)
    .bind(code_hash)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(())
}

/// Most recent unconsumed, unexpired code for the qualified identifier.
pub async fn latest_active(
    pool: &PgPool,
    qualified_identifier: &str,
) -> Result<Option<LoginCode>, AppError> {
    sqlx::query_as::<_, LoginCode>(
        r#"
        SELECT id, identifier, code_hash, expires_at, attempts, consumed_at, created_at
        FROM system_login_codes
        WHERE identifier = $1
          AND consumed_at IS NULL
          AND expires_at > now()
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(qualified_identifier)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)
}

/// Counts one attempt against the code before its hash is compared, so at
/// most `max_attempts` guesses are ever evaluated for a row.
pub async fn reserve_attempt(
    pool: &PgPool,
    code_id: Uuid,
    max_attempts: i32,
) -> Result<Reservation, AppError> {
    let reserved = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE system_login_codes
        SET attempts = attempts + 1
        WHERE id = $1
          AND consumed_at IS NULL
          AND expires_at > now()
          AND attempts < $2
        RETURNING attempts
        "#,
    )
    .bind(code_id)
    .bind(max_attempts)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    if let Some(attempts) = reserved {
        return Ok(Reservation::Granted { attempts });
    }

    // attempts only grow, so a later read sees whatever blocked the update
    let exhausted = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT attempts >= $2
        FROM system_login_codes
        WHERE id = $1 AND consumed_at IS NULL AND expires_at > now()
        "#,
    )
    .bind(code_id)
    .bind(max_attempts)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(match exhausted {
        Some(true) => Reservation::Exhausted,
        _ => Reservation::Gone,
    })
}

/// Returns `false` when another request consumed the row first.
pub async fn consume(pool: &PgPool, code_id: Uuid, max_attempts: i32) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE system_login_codes
        SET consumed_at = now()
        WHERE id = $1
          AND consumed_at IS NULL
          AND expires_at > now()
          AND attempts <= $2
        "#,
    )
    .bind(code_id)
    .bind(max_attempts)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected() == 1)
}
