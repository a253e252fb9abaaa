use crate::core::{AppError, AppErrorType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FileRequestStatus {
    Requested,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SystemFile {
    pub id: Uuid,
    pub title: String,
    #[serde(skip)]
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
}

/// File listing row with the caller's standing on it.
#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileWithAccess {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub permitted: bool,
    pub request_status: Option<FileRequestStatus>,
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FileAccessRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_id: Uuid,
    pub status: FileRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingFileRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub file_id: Uuid,
    pub file_title: String,
    pub requested_at: DateTime<Utc>,
}

/// The permission row is what authorizes a download; the request row only
/// explains why there is none yet.
pub fn file_gate(has_permission: bool, request: Option<FileRequestStatus>) -> Result<(), AppError> {
    if has_permission {
        return Ok(());
    }
    match request {
        Some(status) => Err(AppError::with_cause(
            AppErrorType::NotApproved,
            format!("file request is {:?}", status),
        )),
        None => Err(AppError::new(AppErrorType::NoAccess)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequestPayload {
    pub file_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct DownloadLink {
    pub url: String,
}
