use crate::models::notifications::NewNotification;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_REJECTION_REASON: &str = "未通过审核 / Not approved";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl ReviewAction {
    pub fn target_status(&self) -> &'static str {
        match self {
            ReviewAction::Approve => "approved",
            ReviewAction::Reject => "rejected",
        }
    }

    /// `approve` always clears the reason; `reject` keeps a non-blank one or
    /// falls back to the default wording.
    pub fn rejection_reason(&self, reason: Option<&str>) -> Option<String> {
        match self {
            ReviewAction::Approve => None,
            ReviewAction::Reject => Some(
                reason
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_REJECTION_REASON)
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Course,
    File,
}

impl ResourceKind {
    pub fn notification_title(&self, action: ReviewAction) -> &'static str {
        match (self, action) {
            (ResourceKind::Course, ReviewAction::Approve) => "课程申请已通过 / Course approved",
            (ResourceKind::Course, ReviewAction::Reject) => "课程申请未通过 / Course rejected",
            (ResourceKind::File, ReviewAction::Approve) => "文件申请已通过 / File access approved",
            (ResourceKind::File, ReviewAction::Reject) => "文件申请未通过 / File access rejected",
        }
    }
}

pub fn course_label(course_id: i32) -> String {
    format!("课程 / Course #{}", course_id)
}

pub fn file_label(title: Option<&str>, file_id: Uuid) -> String {
    match title {
        Some(title) => format!("文件 / File \"{}\"", title),
        None => format!("文件 / File {}", file_id),
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct CourseReviewItem {
    pub user_id: Uuid,
    pub course_id: i32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FileReviewItem {
    pub user_id: Uuid,
    pub file_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkReviewPayload<T: Serialize> {
    #[validate(length(min = 1, max = 500))]
    pub items: Vec<T>,
    pub action: ReviewAction,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SingleReviewPayload {
    pub access_id: Uuid,
    pub action: ReviewAction,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RangeApprovePayload {
    pub user_id: Option<Uuid>,
    pub from_course_id: Option<i32>,
    pub to_course_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub updated: usize,
    pub notified: usize,
}

/// First occurrence wins, order preserved.
pub fn dedup_items<T: Eq + Hash + Copy>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().copied().filter(|item| seen.insert(*item)).collect()
}

/// One notification per affected user, listing every resource of theirs
/// that this review touched.
pub fn build_review_notifications(
    kind: ResourceKind,
    action: ReviewAction,
    reason: Option<&str>,
    reviewer: Uuid,
    affected: &[(Uuid, String)],
) -> Vec<NewNotification> {
    let mut per_user: BTreeMap<Uuid, Vec<&str>> = BTreeMap::new();
    for (user_id, label) in affected {
        per_user.entry(*user_id).or_default().push(label.as_str());
    }

    per_user
        .into_iter()
        .map(|(user_id, labels)| {
            let labels = labels.join(", ");
            let content = match action {
                ReviewAction::Approve => {
                    format!("您的申请已通过 / Your request was approved: {}", labels)
                }
                ReviewAction::Reject => format!(
                    "您的申请未通过 / Your request was rejected: {}。原因 / Reason: {}",
                    labels,
                    reason.unwrap_or(DEFAULT_REJECTION_REASON)
                ),
            };
            NewNotification {
                to_user_id: user_id,
                from_user_id: Some(reviewer),
                title: kind.notification_title(action).to_string(),
                content: Some(content),
            }
        })
        .collect()
}
