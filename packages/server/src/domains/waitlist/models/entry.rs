use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{EntryId, ServiceId, StaffId, TenantId};

/// Waitlist entry lifecycle.
///
/// `active → notified` when a hold is placed for the entry; back to `active`
/// when the customer declines or the hold expires; `confirmed` on booking;
/// `removed` on customer request or when another booking for the same phone
/// lands first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Active,
    Notified,
    Confirmed,
    Removed,
}

/// A customer waiting for an opening on a specific service.
///
/// `staff_id = None` means any staff member will do. The time window
/// (`earliest_time`, `latest_time`) bounds acceptable slot times; a slot must
/// fit entirely inside it to match.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct WaitlistEntry {
    pub id: EntryId,
    pub tenant_id: TenantId,
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service_id: ServiceId,
    pub staff_id: Option<StaffId>,
    pub earliest_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
    pub vip: bool,
    /// Score computed at insert time; ranking recomputes live so the tenure
    /// bonus keeps accruing, this column feeds the matching index.
    pub priority_score: i32,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub customer_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub service_id: ServiceId,
    pub staff_id: Option<StaffId>,
    pub earliest_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
    #[serde(default)]
    pub vip: bool,
}
