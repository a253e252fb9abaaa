use crate::core::session_auth::{ensure_not_frozen, SessionKeys, SessionUser};
use crate::core::{
    no_store, ok_empty, AppError, AppErrorType, AppSuccessResponse, Empty, LoginCodeService,
};
use crate::db::sessions::{self, ClientInfo};
use crate::db::users;
use crate::models::login_codes::{
    CodePurpose, Identifier, RequestCodePayload, ResetPasswordPayload, VerifyCodePayload,
};
use crate::models::users::{LoginEvent, PasswordLoginRequest, Profile, ProfileSummary};
use crate::routes::extract::{client_info, validated_body};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
struct UserEnvelope<T> {
    user: T,
}

/// Creates the session row, signs the cookie and records how the user got in.
async fn start_session(
    pool: &PgPool,
    keys: &SessionKeys,
    profile: Profile,
    event: LoginEvent,
    client: ClientInfo,
) -> Result<HttpResponse, AppError> {
    ensure_not_frozen(profile.status)?;

    let expires_at = Utc::now() + keys.ttl;
    let session_id = sessions::create_session(pool, profile.id, expires_at, &client).await?;
    let token = keys.issue(profile.id, session_id, expires_at)?;
    sessions::append_login_log(pool, profile.id, event, &client).await?;

    tracing::info!(user_id = %profile.id, event = event.as_str(), "Session started");

    Ok(no_store(HttpResponse::Ok())
        .cookie(keys.cookie(token))
        .json(AppSuccessResponse {
            ok: true,
            data: UserEnvelope {
                user: ProfileSummary::from(profile),
            },
        }))
}

#[tracing::instrument(name = "Password login", skip(req, pool, keys, body))]
#[post("/login")]
pub async fn password_login(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    keys: web::Data<SessionKeys>,
    body: Result<web::Json<PasswordLoginRequest>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    let body = validated_body(body)?;
    let identifier = Identifier::parse(&body.email)?;

    let profile = users::get_user_by_identifier(&pool, &identifier)
        .await?
        .ok_or_else(|| AppError::unauthorized("Email or password is incorrect"))?;

    let password_ok = match &profile.password_hash {
        Some(hash) => users::verify_password(&body.password, hash)?,
        None => false,
    };
    if !password_ok {
        return Err(AppError::unauthorized("Email or password is incorrect"));
    }

    start_session(&pool, &keys, profile, LoginEvent::LoginPassword, client_info(&req)).await
}

async fn request_code_for(
    pool: &PgPool,
    codes: &LoginCodeService,
    raw_identifier: &str,
    purpose: CodePurpose,
) -> Result<HttpResponse, AppError> {
    let identifier = Identifier::parse(raw_identifier)?;

    // Unknown identifiers get the same answer as known ones.
    if users::get_user_by_identifier(pool, &identifier).await?.is_none() {
        tracing::info!(purpose = purpose.as_str(), "Code requested for unknown identifier");
        return Ok(ok_empty());
    }

    let issued = codes.request_code(pool, &identifier, purpose).await?;
    Ok(AppSuccessResponse::ok(issued))
}

#[tracing::instrument(name = "Request login code", skip(pool, codes, body))]
#[post("/login/request-code")]
pub async fn request_login_code(
    pool: web::Data<PgPool>,
    codes: web::Data<LoginCodeService>,
    body: Result<web::Json<RequestCodePayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    let body = validated_body(body)?;
    request_code_for(&pool, &codes, &body.identifier, CodePurpose::Login).await
}

#[tracing::instrument(name = "Verify login code", skip(req, pool, keys, codes, body))]
#[post("/login/verify")]
pub async fn verify_login_code(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    keys: web::Data<SessionKeys>,
    codes: web::Data<LoginCodeService>,
    body: Result<web::Json<VerifyCodePayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    let body = validated_body(body)?;
    let identifier = Identifier::parse(&body.identifier)?;

    codes
        .verify_code(&pool, &identifier, CodePurpose::Login, &body.code)
        .await?;

    // a code is only ever issued for an existing profile
    let profile = users::get_user_by_identifier(&pool, &identifier)
        .await?
        .ok_or_else(|| AppError::new(AppErrorType::InvalidCode))?;

    start_session(&pool, &keys, profile, LoginEvent::LoginCode, client_info(&req)).await
}

#[tracing::instrument(name = "Logout", skip(req, pool, keys, user), fields(user_id = %user.id))]
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    keys: web::Data<SessionKeys>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    sessions::revoke_session(&pool, user.session_id).await?;
    sessions::append_login_log(&pool, user.id, LoginEvent::Logout, &client_info(&req)).await?;

    Ok(no_store(HttpResponse::Ok())
        .cookie(keys.removal_cookie())
        .json(AppSuccessResponse {
            ok: true,
            data: Empty {},
        }))
}

#[get("/me")]
pub async fn me(user: SessionUser) -> Result<HttpResponse, AppError> {
    Ok(AppSuccessResponse::ok(UserEnvelope { user }))
}

#[tracing::instrument(name = "Request password reset code", skip(pool, codes, body))]
#[post("/password/request-code")]
pub async fn request_reset_code(
    pool: web::Data<PgPool>,
    codes: web::Data<LoginCodeService>,
    body: Result<web::Json<RequestCodePayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    let body = validated_body(body)?;
    request_code_for(&pool, &codes, &body.identifier, CodePurpose::Reset).await
}

#[tracing::instrument(name = "Reset password", skip(req, pool, codes, body))]
#[post("/password/reset")]
pub async fn reset_password(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    codes: web::Data<LoginCodeService>,
    body: Result<web::Json<ResetPasswordPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    let body = validated_body(body)?;
    let identifier = Identifier::parse(&body.identifier)?;

    codes
        .verify_code(&pool, &identifier, CodePurpose::Reset, &body.code)
        .await?;

    let profile = users::get_user_by_identifier(&pool, &identifier)
        .await?
        .ok_or_else(|| AppError::new(AppErrorType::InvalidCode))?;

    users::change_user_password(&pool, profile.id, &body.new_password).await?;
    let revoked = sessions::revoke_all_for_user(&pool, profile.id).await?;
    sessions::append_login_log(&pool, profile.id, LoginEvent::PasswordReset, &client_info(&req))
        .await?;

    tracing::info!(user_id = %profile.id, revoked, "Password reset");

    if let Some(mailer) = codes.mailer() {
        if let Err(e) = mailer.send_password_reset_confirmation(&profile.email).await {
            tracing::warn!("Password reset confirmation not sent: {}", e);
        }
    }

    Ok(ok_empty())
}
