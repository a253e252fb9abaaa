use crate::core::config::CourseCatalog;
use crate::core::policy::Action;
use crate::core::session_auth::SessionUser;
use crate::core::{AppError, AppSuccessResponse};
use crate::db::{course_access, file_access, notifications, review, users};
use crate::models::course_access::{CourseAccess, PendingCourseRequest};
use crate::models::file_access::PendingFileRequest;
use crate::models::notifications::NewNotification;
use crate::models::review::{
    build_review_notifications, course_label, dedup_items, file_label, BulkReviewPayload,
    CourseReviewItem, FileReviewItem, RangeApprovePayload, ResourceKind, ReviewAction,
    ReviewOutcome, SingleReviewPayload,
};
use crate::routes::course_access::ensure_in_catalog;
use crate::routes::extract::{json_body, query_params, validated_body};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuery {
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
struct PendingCourses {
    requests: Vec<PendingCourseRequest>,
}

#[derive(Serialize)]
struct PendingFiles {
    requests: Vec<PendingFileRequest>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SingleReviewOutcome {
    access: CourseAccess,
    notified: usize,
}

/// Leaders may only act on students whose `leader_id` points at them.
async fn ensure_leader_owns(
    pool: &PgPool,
    reviewer: &SessionUser,
    user_ids: &[Uuid],
) -> Result<(), AppError> {
    if let Some(leader_id) = reviewer.leader_scope() {
        if !users::all_led_by(pool, leader_id, user_ids).await? {
            tracing::warn!(%leader_id, "Leader reviewed items outside their group");
            return Err(AppError::forbidden());
        }
    }
    Ok(())
}

/// Notification failures do not undo the ledger write that preceded them.
async fn notify(pool: &PgPool, batch: &[NewNotification]) -> Result<usize, AppError> {
    notifications::insert_many(pool, batch).await.map_err(|e| {
        tracing::error!("Ledger updated but notifications failed: {}", e);
        e
    })?;
    Ok(batch.len())
}

#[tracing::instrument(name = "Review course request", skip(pool, user, body), fields(reviewer = %user.id))]
#[post("/course-access/review")]
pub async fn review_course(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<SingleReviewPayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ReviewSingle)?;
    let body = validated_body(body)?;

    let reason = body.action.rejection_reason(body.reason.as_deref());
    let updated = review::review_single_course(
        &pool,
        body.access_id,
        body.action,
        reason.as_deref(),
        user.id,
    )
    .await?;

    let access = match updated {
        Some(row) => row,
        None => {
            // completed rows are final; report them unchanged
            let current = course_access::find_by_id(&pool, body.access_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("access {}", body.access_id)))?;
            return Ok(AppSuccessResponse::ok(SingleReviewOutcome {
                access: current,
                notified: 0,
            }));
        }
    };

    let batch = build_review_notifications(
        ResourceKind::Course,
        body.action,
        reason.as_deref(),
        user.id,
        &[(access.user_id, course_label(access.course_id))],
    );
    let notified = notify(&pool, &batch).await?;

    Ok(AppSuccessResponse::ok(SingleReviewOutcome { access, notified }))
}

#[tracing::instrument(name = "Bulk review course requests", skip(pool, catalog, user, body), fields(reviewer = %user.id))]
#[post("/course-access/bulk-review")]
pub async fn bulk_review_courses(
    pool: web::Data<PgPool>,
    catalog: web::Data<CourseCatalog>,
    user: SessionUser,
    body: Result<web::Json<BulkReviewPayload<CourseReviewItem>>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ReviewBulk)?;
    let body = validated_body(body)?;

    let items = dedup_items(&body.items);
    for item in &items {
        ensure_in_catalog(&catalog, item.course_id)?;
    }
    let user_ids: Vec<Uuid> = items.iter().map(|item| item.user_id).collect();
    ensure_leader_owns(&pool, &user, &user_ids).await?;

    let reason = body.action.rejection_reason(body.reason.as_deref());
    let changed =
        review::bulk_review_courses(&pool, &items, body.action, reason.as_deref(), user.id).await?;

    let affected: Vec<(Uuid, String)> = changed
        .iter()
        .map(|(user_id, course_id)| (*user_id, course_label(*course_id)))
        .collect();
    let batch = build_review_notifications(
        ResourceKind::Course,
        body.action,
        reason.as_deref(),
        user.id,
        &affected,
    );
    let notified = notify(&pool, &batch).await?;

    tracing::info!(updated = changed.len(), notified, "Bulk course review applied");
    Ok(AppSuccessResponse::ok(ReviewOutcome {
        updated: changed.len(),
        notified,
    }))
}

#[tracing::instrument(name = "Approve course range", skip(pool, user, body), fields(reviewer = %user.id))]
#[post("/course-access/approve-range")]
pub async fn approve_course_range(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<RangeApprovePayload>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ApproveRange)?;
    let body = json_body(body)?;
    if let (Some(from), Some(to)) = (body.from_course_id, body.to_course_id) {
        if from > to {
            return Err(AppError::invalid_body("fromCourseId must not exceed toCourseId"));
        }
    }

    let changed = review::approve_course_range(
        &pool,
        body.user_id,
        body.from_course_id,
        body.to_course_id,
        user.id,
    )
    .await?;

    let affected: Vec<(Uuid, String)> = changed
        .iter()
        .map(|(user_id, course_id)| (*user_id, course_label(*course_id)))
        .collect();
    let batch = build_review_notifications(
        ResourceKind::Course,
        ReviewAction::Approve,
        None,
        user.id,
        &affected,
    );
    let notified = notify(&pool, &batch).await?;

    Ok(AppSuccessResponse::ok(ReviewOutcome {
        updated: changed.len(),
        notified,
    }))
}

#[tracing::instrument(name = "List pending course requests", skip(pool, user, query), fields(reviewer = %user.id))]
#[get("/course-access/pending")]
pub async fn pending_courses(
    pool: web::Data<PgPool>,
    user: SessionUser,
    query: Result<web::Query<PendingQuery>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ListPendingRequests)?;
    let query = query_params(query)?;
    let requests = course_access::list_pending(&pool, user.leader_scope(), query.user_id).await?;
    Ok(AppSuccessResponse::ok(PendingCourses { requests }))
}

#[tracing::instrument(name = "Bulk review file requests", skip(pool, user, body), fields(reviewer = %user.id))]
#[post("/file-access/bulk-review")]
pub async fn bulk_review_files(
    pool: web::Data<PgPool>,
    user: SessionUser,
    body: Result<web::Json<BulkReviewPayload<FileReviewItem>>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ReviewBulk)?;
    let body = validated_body(body)?;

    let items = dedup_items(&body.items);
    let user_ids: Vec<Uuid> = items.iter().map(|item| item.user_id).collect();
    ensure_leader_owns(&pool, &user, &user_ids).await?;

    let reason = body.action.rejection_reason(body.reason.as_deref());

    // The grant is written before the request rows and outside any shared
    // transaction, so a failure in between leaves a live grant on a
    // `requested` row.
    let changed = match body.action {
        ReviewAction::Approve => {
            let granted = review::grant_file_permissions(&pool, &items, user.id).await?;
            tracing::info!(granted, "File permissions granted");
            review::bulk_review_files(&pool, &items, body.action, reason.as_deref(), user.id)
                .await?
        }
        ReviewAction::Reject => {
            let changed =
                review::bulk_review_files(&pool, &items, body.action, reason.as_deref(), user.id)
                    .await?;
            let revoked = review::revoke_file_permissions(&pool, &items).await?;
            tracing::info!(revoked, "File permissions revoked");
            changed
        }
    };

    let file_ids: Vec<Uuid> = changed.iter().map(|(_, file_id)| *file_id).collect();
    let titles = file_access::file_titles(&pool, &file_ids).await?;
    let affected: Vec<(Uuid, String)> = changed
        .iter()
        .map(|(user_id, file_id)| {
            (
                *user_id,
                file_label(titles.get(file_id).map(String::as_str), *file_id),
            )
        })
        .collect();
    let batch = build_review_notifications(
        ResourceKind::File,
        body.action,
        reason.as_deref(),
        user.id,
        &affected,
    );
    let notified = notify(&pool, &batch).await?;

    Ok(AppSuccessResponse::ok(ReviewOutcome {
        updated: changed.len(),
        notified,
    }))
}

#[tracing::instrument(name = "List pending file requests", skip(pool, user, query), fields(reviewer = %user.id))]
#[get("/file-access/pending")]
pub async fn pending_files(
    pool: web::Data<PgPool>,
    user: SessionUser,
    query: Result<web::Query<PendingQuery>, actix_web::Error>,
) -> Result<HttpResponse, AppError> {
    user.require(Action::ListPendingRequests)?;
    let query = query_params(query)?;
    let requests = file_access::list_pending(&pool, user.leader_scope(), query.user_id).await?;
    Ok(AppSuccessResponse::ok(PendingFiles { requests }))
}
