use crate::core::config::StorageConfig;
use crate::core::policy::Action;
use crate::core::session_auth::SessionUser;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::file_access;
use crate::models::file_access::{
    file_gate, DownloadLink, FileAccessRequest, FileRequestPayload, FileWithAccess,
};
use crate::routes::extract::json_body;
use actix_web::{get, post, web, HttpResponse};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Serialize)]
struct FileList {
    files: Vec<FileWithAccess>,
}

#[derive(Serialize)]
struct RequestEnvelope {
    request: FileAccessRequest,
}

#[derive(Serialize)]
struct RequestList {
    requests: Vec<FileAccessRequest>,
}

#[tracing::instrument(name = "List files", skip(pool, user), fields(user_id = %user.id))]
#[get("")]
pub async fn list_files(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::UsePortal)?;
    let mut files = file_access::list_files_for_user(&pool, user.id).await?;
    if user.is_staff() {
        for file in files.iter_mut() {
            file.permitted = true;
        }
    }
    Ok(AppSuccessResponse::ok(FileList { files }))
}

#[tracing::instrument(name = "Request file access", skip(pool, user, body), fields(user_id = %user.id))]
#[post("/request")]
pub async fn request_file(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<FileRequestPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require_student()?;
    let body = json_body(body)?;

    file_access::find_file(&pool, body.file_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("file {} does not exist", body.file_id)))?;

    let request = file_access::submit(&pool, user.id, body.file_id).await?;
    Ok(AppSuccessResponse::ok(RequestEnvelope { request }))
}

#[tracing::instrument(name = "List my file requests", skip(pool, user), fields(user_id = %user.id))]
#[get("/access")]
pub async fn my_file_requests(
    pool: web::Data<PgPool>,
    user: SessionUser,
) -> Result<HttpResponse, AppError> {
    user.require(Action::UsePortal)?;
    let requests = file_access::list_for_user(&pool, user.id).await?;
    Ok(AppSuccessResponse::ok(RequestList { requests }))
}

#[tracing::instrument(name = "Download file", skip(pool, storage, user), fields(user_id = %user.id))]
#[get("/{file_id}/download")]
pub async fn download_file(
    pool: web::Data<PgPool>,
    storage: web::Data<StorageConfig>,
    user: SessionUser,
    file_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ConsumeResource)?;
    let file_id = file_id.into_inner();

    let file = file_access::find_file(&pool, file_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("file {} does not exist", file_id)))?;

    if !user.is_staff() {
        let (permitted, request) = file_access::gate_state(&pool, user.id, file_id).await?;
        file_gate(permitted, request)?;
    }

    Ok(AppSuccessResponse::ok(DownloadLink {
        url: storage.public_url(&file.storage_path),
    }))
}
