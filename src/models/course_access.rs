use crate::core::{AppError, AppErrorType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Ledger status of a (user, course) pair. "none" is the absence of a row.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    Requested,
    Approved,
    Rejected,
    Completed,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Requested => "requested",
            AccessStatus::Approved => "approved",
            AccessStatus::Rejected => "rejected",
            AccessStatus::Completed => "completed",
        }
    }

    pub fn grants_access(&self) -> bool {
        matches!(self, AccessStatus::Approved | AccessStatus::Completed)
    }
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseAccess {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: i32,
    pub status: AccessStatus,
    pub requested_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub rejection_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: i32,
    pub updated_at: DateTime<Utc>,
}

/// Pending queue row, joined with the requester's profile.
#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PendingCourseRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub course_id: i32,
    pub requested_at: DateTime<Utc>,
}

/// Read-side gate shared by every dependent operation.
pub fn can_consume(current: Option<AccessStatus>) -> Result<(), AppError> {
    match current {
        Some(status) if status.grants_access() => Ok(()),
        Some(status) => Err(AppError::with_cause(
            AppErrorType::NotApproved,
            format!("course access is {}", status.as_str()),
        )),
        None => Err(AppError::new(AppErrorType::NoAccess)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequestPayload {
    pub course_id: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressPayload {
    pub course_id: i32,
    #[validate(range(min = 0, max = 100))]
    pub progress: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CourseNotePayload {
    pub course_id: i32,
    #[validate(length(max = 20000))]
    pub content: String,
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseNote {
    pub course_id: i32,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}
