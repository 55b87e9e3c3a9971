use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{EntryId, ServiceId, SlotId, StaffId, TenantId};

/// Lifecycle of a concrete appointment window.
///
/// `open → held → booked` is the normal path. A held slot drops back to
/// `open` on decline or hold expiry. `booked` and `canceled` are terminal for
/// the row; reopening inventory means creating a new slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "slot_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Held,
    Booked,
    Canceled,
}

/// A bookable window on one staff member for one service.
///
/// `hold_expires_at` and `held_entry_id` are set iff `status = Held`; the
/// database enforces that shape with a CHECK constraint, and every transition
/// goes through a guarded UPDATE so at most one concurrent writer wins.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Slot {
    pub id: SlotId,
    pub tenant_id: TenantId,
    pub staff_id: StaffId,
    pub service_id: ServiceId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub held_entry_id: Option<EntryId>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// True when the slot is held and the hold is still live at `now`.
    pub fn hold_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Held
            && self.hold_expires_at.map(|t| t > now).unwrap_or(false)
    }
}

/// Input for slot creation; validation happens at insert time.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSlot {
    pub staff_id: StaffId,
    pub service_id: ServiceId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
