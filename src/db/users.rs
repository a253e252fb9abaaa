use crate::core::AppError;
use crate::models::login_codes::Identifier;
use crate::models::users::{AccountStatus, Profile};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sqlx::PgPool;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = r#"
    id, email, phone, display_name, password_hash, role, status, leader_id, created_at, updated_at
"#;

pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<Profile>, AppError> {
    let query = format!("SELECT {} FROM system_profiles WHERE id = $1", PROFILE_COLUMNS);
    sqlx::query_as::<_, Profile>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn get_user_by_identifier(
    pool: &PgPool,
    identifier: &Identifier,
) -> Result<Option<Profile>, AppError> {
    let column = match identifier {
        Identifier::Email(_) => "email",
        Identifier::Phone(_) => "phone",
    };
    let query = format!(
        "SELECT {} FROM system_profiles WHERE {} = $1",
        PROFILE_COLUMNS, column
    );
    sqlx::query_as::<_, Profile>(&query)
        .bind(identifier.as_str())
        .fetch_optional(pool)
        .await
        .map_err(AppError::db_error)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<Profile>, AppError> {
    let query = format!(
        "SELECT {} FROM system_profiles ORDER BY created_at DESC",
        PROFILE_COLUMNS
    );
    sqlx::query_as::<_, Profile>(&query)
        .fetch_all(pool)
        .await
        .map_err(AppError::db_error_verbose)
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::internal_error("Failed to hash password"))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::internal_error("Invalid password hash"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub async fn change_user_password(
    pool: &PgPool,
    user_id: Uuid,
    new_password: &str,
) -> Result<(), AppError> {
    let password_hash = hash_password(new_password)?;

    sqlx::query(
        r#"
        UPDATE system_profiles
        SET password_hash = $1, updated_at = now()
        WHERE id = $2
        "#,
    )
    .bind(password_hash)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(())
}

pub async fn update_status(
    pool: &PgPool,
    user_id: Uuid,
    status: AccountStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE system_profiles SET status = $1, updated_at = now() WHERE id = $2",
    )
    .bind(status)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected() > 0)
}

pub async fn set_leader(
    pool: &PgPool,
    user_id: Uuid,
    leader_id: Option<Uuid>,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE system_profiles SET leader_id = $1, updated_at = now() WHERE id = $2",
    )
    .bind(leader_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(result.rows_affected() > 0)
}

/// True when every id in `user_ids` names a student led by `leader_id`.
pub async fn all_led_by(
    pool: &PgPool,
    leader_id: Uuid,
    user_ids: &[Uuid],
) -> Result<bool, AppError> {
    let mut distinct = user_ids.to_vec();
    distinct.sort();
    distinct.dedup();

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM system_profiles WHERE id = ANY($1) AND leader_id = $2",
    )
    .bind(&distinct)
    .bind(leader_id)
    .fetch_one(pool)
    .await
    .map_err(AppError::db_error)?;

    Ok(count == distinct.len() as i64)
}
