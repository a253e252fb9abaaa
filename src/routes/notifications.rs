use crate::core::policy::Action;
use crate::core::session_auth::SessionUser;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::notifications;
use crate::models::notifications::{MarkReadPayload, Notification, SendNotificationPayload};
use crate::routes::extract::{json_body, validated_body};
use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
struct Inbox {
    notifications: Vec<Notification>,
}

#[derive(Serialize)]
struct Sent {
    sent: u64,
}

#[derive(Serialize)]
struct Marked {
    updated: u64,
}

#[tracing::instrument(name = "Send notification", skip(pool, user, body), fields(sender = %user.id))]
#[post("/notifications")]
pub async fn send_notification(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<SendNotificationPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::SendNotification)?;
    let body = validated_body(body)?;

    let batch = body.into_notifications(user.id);
    let sent = notifications::insert_many(&pool, &batch).await?;
    Ok(AppSuccessResponse::ok(Sent { sent }))
}

#[tracing::instrument(name = "List notifications", skip(pool, user), fields(user_id = %user.id))]
#[get("")]
pub async fn list_notifications(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::UsePortal)?;
    let notifications = notifications::list_for_user(&pool, user.id).await?;
    Ok(AppSuccessResponse::ok(Inbox { notifications }))
}

#[tracing::instrument(name = "Mark notification read", skip(pool, user, body), fields(user_id = %user.id))]
#[post("/read")]
pub async fn mark_read(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<MarkReadPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::UsePortal)?;
    let body = json_body(body)?;
    let updated = notifications::mark_read(&pool, user.id, body.id).await?;
    Ok(AppSuccessResponse::ok(Marked {
        updated: u64::from(updated),
    }))
}

#[tracing::instrument(name = "Mark all notifications read", skip(pool, user), fields(user_id = %user.id))]
#[post("/read-all")]
pub async fn mark_all_read(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::UsePortal)?;
    let updated = notifications::mark_all_read(&pool, user.id).await?;
    Ok(AppSuccessResponse::ok(Marked { updated }))
}
