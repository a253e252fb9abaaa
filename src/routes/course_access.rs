use crate::core::config::CourseCatalog;
use crate::core::policy::Action;
use crate::core::session_auth::SessionUser;
use crate::core::{AppError, AppErrorType, AppSuccessResponse};
use crate::db::course_access;
use crate::models::course_access::{
    can_consume, CourseAccess, CourseNote, CourseNotePayload, CourseProgressPayload,
    CourseRequestPayload,
};
use crate::routes::extract::{json_body, validated_body};
use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessEnvelope {
    course_id: i32,
    access: Option<CourseAccess>,
}

#[derive(Serialize)]
struct AccessList {
    access: Vec<CourseAccess>,
}

#[derive(Serialize)]
struct NoteEnvelope {
    note: Option<CourseNote>,
}

pub(crate) fn ensure_in_catalog(catalog: &CourseCatalog, course_id: i32) -> Result<(), AppError> {
    if catalog.contains(course_id) {
        Ok(())
    } else {
        Err(AppError::with_cause(
            AppErrorType::InvalidCourse,
            format!("course {} is outside the catalog", course_id),
        ))
    }
}

/// Loads the caller's row and applies the consume gate. Staff skip the gate.
async fn gated_access(
    pool: &PgPool,
    user: &SessionUser,
    course_id: i32,
) -> Result<Option<CourseAccess>, AppError> {
    user.require(Action::ConsumeResource)?;
    let row = course_access::find(pool, user.id, course_id).await?;
    if !user.is_staff() {
        can_consume(row.as_ref().map(|r| r.status))?;
    }
    Ok(row)
}

#[tracing::instrument(name = "Request course access", skip(pool, catalog, user, body), fields(user_id = %user.id))]
#[post("/request")]
pub async fn request_course(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    body: Result<web::Json<CourseRequestPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require_student()?;
    let body = json_body(body)?;
    ensure_in_catalog(&catalog, body.course_id)?;

    let row = course_access::submit(&pool, user.id, body.course_id).await?;
    Ok(AppSuccessResponse::ok(AccessEnvelope {
        course_id: row.course_id,
        access: Some(row),
    }))
}

#[tracing::instrument(name = "Complete course", skip(pool, catalog, user, body), fields(user_id = %user.id))]
#[post("/complete")]
pub async fn complete_course(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    body: Result<web::Json<CourseRequestPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ConsumeResource)?;
    let body = json_body(body)?;
    ensure_in_catalog(&catalog, body.course_id)?;

    match course_access::complete(&pool, user.id, body.course_id).await? {
        Some(row) => Ok(AppSuccessResponse::ok(AccessEnvelope {
            course_id: row.course_id,
            access: Some(row),
        })),
        None => {
            // Explain the refusal with the same codes the gate uses.
            let current = course_access::find(&pool, user.id, body.course_id).await?;
            can_consume(current.as_ref().map(|r| r.status))?;
            Err(AppError::with_cause(
                AppErrorType::NotApproved,
                "course changed state during completion",
            ))
        }
    }
}

#[tracing::instrument(name = "Update course progress", skip(pool, catalog, user, body), fields(user_id = %user.id))]
#[post("/progress")]
pub async fn update_progress(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    body: Result<web::Json<CourseProgressPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ConsumeResource)?;
    let body = validated_body(body)?;
    ensure_in_catalog(&catalog, body.course_id)?;

    match course_access::update_progress(&pool, user.id, body.course_id, body.progress).await? {
        Some(row) => Ok(AppSuccessResponse::ok(AccessEnvelope {
            course_id: row.course_id,
            access: Some(row),
        })),
        None => {
            let current = course_access::find(&pool, user.id, body.course_id).await?;
            can_consume(current.as_ref().map(|r| r.status))?;
            Err(AppError::with_cause(
                AppErrorType::NotApproved,
                "course changed state during progress update",
            ))
        }
    }
}

#[tracing::instrument(name = "Save course note", skip(pool, catalog, user, body), fields(user_id = %user.id))]
#[post("/notes")]
pub async fn save_note(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    body: Result<web::Json<CourseNotePayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    let body = validated_body(body)?;
    ensure_in_catalog(&catalog, body.course_id)?;
    gated_access(&pool, &user, body.course_id).await?;

    let note = course_access::upsert_note(&pool, user.id, body.course_id, &body.content).await?;
    Ok(AppSuccessResponse::ok(NoteEnvelope { note: Some(note) }))
}

#[tracing::instrument(name = "List my course access", skip(pool, user), fields(user_id = %user.id))]
#[get("/access")]
pub async fn my_course_access(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::UsePortal)?;
    let access = course_access::list_for_user(&pool, user.id).await?;
    Ok(AppSuccessResponse::ok(AccessList { access }))
}

#[tracing::instrument(name = "View course", skip(pool, catalog, user), fields(user_id = %user.id))]
#[get("/{course_id}")]
pub async fn view_course(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    course_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let course_id = course_id.into_inner();
    ensure_in_catalog(&catalog, course_id)?;
    let access = gated_access(&pool, &user, course_id).await?;
    Ok(AppSuccessResponse::ok(AccessEnvelope { course_id, access }))
}

#[tracing::instrument(name = "Get course note", skip(pool, catalog, user), fields(user_id = %user.id))]
#[get("/{course_id}/notes")]
pub async fn get_note(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    course_id: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let course_id = course_id.into_inner();
    ensure_in_catalog(&catalog, course_id)?;
    gated_access(&pool, &user, course_id).await?;

    let note = course_access::get_note(&pool, user.id, course_id).await?;
    Ok(AppSuccessResponse::ok(NoteEnvelope { note }))
}
