use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{BookingId, EntryId, SlotId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Completed,
    NoShow,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    Waitlist,
    Direct,
    WalkIn,
}

/// A finalized appointment. At most one non-canceled booking exists per slot
/// (partial unique index on slot_id).
///
/// `waitlist_entry_id` is a weak back-reference: the entry may later be
/// soft-removed without touching the booking.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub tenant_id: TenantId,
    pub slot_id: SlotId,
    pub waitlist_entry_id: Option<EntryId>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub status: BookingStatus,
    pub source: BookingSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
