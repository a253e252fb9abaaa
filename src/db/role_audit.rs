use crate::core::AppError;
use crate::models::users::{Role, RoleAuditLog};
use sqlx::PgPool;
use uuid::Uuid;

const AUDIT_LIST_LIMIT: i64 = 100;

/// Writes the new role and the audit row in one statement. Returns `None`
/// when the target does not exist or already holds `to_role`.
pub async fn change_role(
    pool: &PgPool,
    actor_id: Uuid,
    target_id: Uuid,
    to_role: Role,
    reason: Option<&str>,
) -> Result<Option<RoleAuditLog>, AppError> {
    sqlx::query_as::<_, RoleAuditLog>(
        r#"
        WITH previous AS (
            SELECT id, role FROM system_profiles WHERE id = $2 FOR UPDATE
        ),
        updated AS (
            UPDATE system_profiles p
            SET role = $3, updated_at = now()
            FROM previous
            WHERE p.id = previous.id AND previous.role <> $3
            RETURNING p.id, previous.role AS from_role
        )
        INSERT INTO role_audit_logs (target_id, actor_id, from_role, to_role, reason)
        SELECT updated.id, $1, updated.from_role, $3, $4
        FROM updated
        RETURNING id, target_id, actor_id, from_role, to_role, reason, created_at
        "#,
    )
    .bind(actor_id)
    .bind(target_id)
    .bind(to_role)
    .bind(reason)
    .fetch_optional(pool)
    .await
    .map_err(AppError::db_error)
}

pub async fn list_recent(pool: &PgPool) -> Result<Vec<RoleAuditLog>, AppError> {
    sqlx::query_as::<_, RoleAuditLog>(
        r#"
        SELECT id, target_id, actor_id, from_role, to_role, reason, created_at
        FROM role_audit_logs
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(AUDIT_LIST_LIMIT)
    .fetch_all(pool)
    .await
    .map_err(AppError::db_error_verbose)
}
