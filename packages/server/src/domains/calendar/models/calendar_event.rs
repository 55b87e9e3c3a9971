use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{CalendarEventId, SlotId, StaffId, TenantId};

use crate::domains::scheduling::models::SlotStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "calendar_event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalendarEventStatus {
    Created,
    Deleted,
    Error,
}

/// Best-effort mirror of a booked slot on the staff member's external
/// calendar. Rows in `error`, and rows whose slot has since been canceled,
/// are picked up by the reconciler.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct CalendarEvent {
    pub id: CalendarEventId,
    pub tenant_id: TenantId,
    pub slot_id: SlotId,
    pub staff_id: StaffId,
    pub external_event_id: Option<String>,
    pub status: CalendarEventStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCalendarEvent {
    pub slot_id: SlotId,
    pub staff_id: StaffId,
    pub external_event_id: Option<String>,
    pub status: CalendarEventStatus,
    pub error: Option<String>,
}

/// A calendar row the reconciler should act on, paired with the current
/// status of its slot so the reconciler can pick create-retry vs delete.
#[derive(Debug, Clone)]
pub struct CalendarRepair {
    pub event: CalendarEvent,
    pub slot_status: SlotStatus,
}
