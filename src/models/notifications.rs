use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const LIST_LIMIT: i64 = 50;

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub to_user_id: Uuid,
    pub from_user_id: Option<Uuid>,
    pub title: String,
    pub content: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub to_user_id: Uuid,
    pub from_user_id: Option<Uuid>,
    pub title: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationPayload {
    #[validate(length(min = 1, max = 500))]
    pub to_user_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub content: Option<String>,
}

impl SendNotificationPayload {
    /// Fan-out without dedup: a repeated id gets the message twice.
    pub fn into_notifications(self, from_user_id: Uuid) -> Vec<NewNotification> {
        let SendNotificationPayload {
            to_user_ids,
            title,
            content,
        } = self;
        to_user_ids
            .into_iter()
            .map(|to_user_id| NewNotification {
                to_user_id,
                from_user_id: Some(from_user_id),
                title: title.clone(),
                content: content.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkReadPayload {
    pub id: Uuid,
}
