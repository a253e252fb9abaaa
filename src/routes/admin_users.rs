use crate::core::policy::Action;
use crate::core::session_auth::SessionUser;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{role_audit, sessions, users};
use crate::models::users::{
    AccountStatus, AssignLeaderRequest, ChangeRoleRequest, ChangeStatusRequest, Profile,
    ProfileSummary, Role, RoleAuditLog,
};
use crate::routes::extract::{json_body, validated_body};
use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Serialize)]
struct UserList {
    users: Vec<ProfileSummary>,
}

#[derive(Serialize)]
struct UserEnvelope {
    user: ProfileSummary,
}

#[derive(Serialize)]
struct RoleChange {
    changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    audit: Option<RoleAuditLog>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusChange {
    user: ProfileSummary,
    revoked_sessions: u64,
}

#[derive(Serialize)]
struct AuditList {
    entries: Vec<RoleAuditLog>,
}

fn reject_self_target(actor: &SessionUser, target_id: Uuid) -> Result<(), AppError> {
    if actor.id == target_id {
        Err(AppError::invalid_target("cannot change your own account"))
    } else {
        Ok(())
    }
}

async fn load_target(pool: &PgPool, user_id: Uuid) -> Result<Profile, AppError> {
    users::get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {} does not exist", user_id)))
}

#[tracing::instrument(name = "List users", skip(pool, user), fields(actor = %user.id))]
#[get("/users")]
pub async fn list_users(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ListUsers)?;
    let users = users::list_users(&pool)
        .await?
        .into_iter()
        .map(ProfileSummary::from)
        .collect();
    Ok(AppSuccessResponse::ok(UserList { users }))
}

#[tracing::instrument(name = "Change user role", skip(pool, user, body), fields(actor = %user.id))]
#[post("/users/role")]
pub async fn change_role(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<ChangeRoleRequest>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ChangeRole)?;
    let body = validated_body(body)?;
    reject_self_target(&user, body.user_id)?;

    let target = load_target(&pool, body.user_id).await?;
    if target.role == body.role {
        return Ok(AppSuccessResponse::ok(RoleChange {
            changed: false,
            audit: None,
        }));
    }

    let reason = body
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    let audit = role_audit::change_role(&pool, user.id, target.id, body.role, reason).await?;

    tracing::info!(
        target_id = %target.id,
        from = %target.role,
        to = %body.role,
        "Role changed"
    );
    Ok(AppSuccessResponse::ok(RoleChange {
        changed: audit.is_some(),
        audit,
    }))
}

#[tracing::instrument(name = "Change user status", skip(pool, user, body), fields(actor = %user.id))]
#[post("/users/status")]
pub async fn change_status(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<ChangeStatusRequest>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ChangeUserStatus)?;
    let body = json_body(body)?;
    reject_self_target(&user, body.user_id)?;

    let mut target = load_target(&pool, body.user_id).await?;
    if target.role == Role::SuperAdmin {
        return Err(AppError::invalid_target("super admins cannot be frozen"));
    }

    users::update_status(&pool, target.id, body.status).await?;
    let revoked_sessions = match body.status {
        AccountStatus::Frozen => sessions::revoke_all_for_user(&pool, target.id).await?,
        AccountStatus::Active => 0,
    };
    target.status = body.status;

    Ok(AppSuccessResponse::ok(StatusChange {
        user: ProfileSummary::from(target),
        revoked_sessions,
    }))
}

#[tracing::instrument(name = "Assign leader", skip(pool, user, body), fields(actor = %user.id))]
#[post("/users/leader")]
pub async fn assign_leader(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<AssignLeaderRequest>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::AssignLeader)?;
    let body = json_body(body)?;

    let mut target = load_target(&pool, body.user_id).await?;
    if let Some(leader_id) = body.leader_id {
        if leader_id == target.id {
            return Err(AppError::invalid_target("a user cannot lead themselves"));
        }
        let leader = users::get_user_by_id(&pool, leader_id)
            .await?
            .ok_or_else(|| AppError::invalid_target("leader does not exist"))?;
        if leader.role != Role::Leader {
            return Err(AppError::invalid_target("assigned user is not a leader"));
        }
    }

    users::set_leader(&pool, target.id, body.leader_id).await?;
    target.leader_id = body.leader_id;

    Ok(AppSuccessResponse::ok(UserEnvelope {
        user: ProfileSummary::from(target),
    }))
}

#[tracing::instrument(name = "List role audit", skip(pool, user), fields(actor = %user.id))]
#[get("/role-audit")]
pub async fn role_audit_log(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ViewRoleAudit)?;
    let entries = role_audit::list_recent(&pool).await?;
    Ok(AppSuccessResponse::ok(AuditList { entries }))
}
