use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{EntryId, NotificationId, SlotId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_channel", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Sms,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_response", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationResponse {
    Confirmed,
    Declined,
}

/// One outbound hold offer to one candidate.
///
/// The row never stores raw tokens, only a sha-256 digest of the signed
/// pair; the tokens themselves live solely in the delivered message.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub tenant_id: TenantId,
    pub entry_id: EntryId,
    pub slot_id: SlotId,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    pub token_digest: String,
    pub provider_id: Option<String>,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub response: Option<NotificationResponse>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub entry_id: EntryId,
    pub slot_id: SlotId,
    pub channel: NotificationChannel,
    pub token_digest: String,
}
