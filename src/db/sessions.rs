use crate::core::AppError;
use crate::models::users::{AccountStatus, LoginEvent, Role};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A live session joined with the profile that owns it.
#[derive(Debug, sqlx::FromRow)]
pub struct SessionIdentity {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub leader_id: Option<Uuid>,
}

pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    client: &ClientInfo,
) -> Result<Uuid, AppError> {
    sqlx::query_scalar(
        r#"
        INSERT INTO system_sessions (user_id, expires_at, last_seen_ip, user_agent)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(expires_at)
    .bind(&client.ip)
    .bind(&client.user_agent)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)
}

pub async fn find_active_identity(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<Option<SessionIdentity>, AppError> {
    sqlx::query_as::<_, SessionIdentity>(
        r#"
        SELECT
            s.id AS session_id,
            p.id AS user_id,
            p.email,
            p.display_name,
            p.role,
            p.status,
            p.leader_id
        FROM system_sessions s
        JOIN system_profiles p ON p.id = s.user_id
        WHERE s.id = $1
          AND s.user_id = $2
          AND s.revoked_at IS NULL
          AND s.expires_at > now()
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)
}

pub async fn revoke_session(pool: &PgPool, session_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE system_sessions SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL",
    )
    .bind(session_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(())
}

pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE system_sessions
        SET revoked_at = now()
        WHERE user_id = $1 AND revoked_at IS NULL
        "#,
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected())
}

pub async fn append_login_log(
    pool: &PgPool,
    user_id: Uuid,
    event: LoginEvent,
    client: &ClientInfo,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO system_login_logs (user_id, event, ip, user_agent)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(event.as_str())
    .bind(&client.ip)
    .bind(&client.user_agent)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(())
}
