//! Persistence boundary.
//!
//! The store is the only shared mutable resource in the system: request
//! handlers and ticker workers coordinate exclusively through its
//! transactional guarantees. Two implementations exist:
//!
//! - [`PgStore`]: Postgres via sqlx, one transaction per transition with
//!   guarded `UPDATE ... WHERE status = <expected>` writes.
//! - [`MemoryStore`]: a mutexed map store applying the identical guards;
//!   the vehicle for engine and interleaving tests.
//!
//! Every method takes the caller's `TenantId` in its signature, so the
//! tenant filter is carried by the compiler rather than remembered at each
//! call site. The only exceptions are the system-scope scans used by
//! background workers (`list_expired_holds`, `calendar_events_needing_repair`),
//! which cross tenants by design and return rows carrying their own
//! `tenant_id` for the follow-up per-row transitions.
//!
//! # Transition contract
//!
//! Each transition method is atomic and CAS-guarded: when the guard misses,
//! the method returns `CoreError::PreconditionFailed` with the sub-kind that
//! names what changed underneath the caller, and the transaction leaves no
//! trace. At most one of any set of concurrent writers observes success.
//! Transitions append their `AuditRecord` inside the same transaction.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{
    CalendarEventId, CoreResult, EntryId, NotificationId, ServiceId, SlotId, StaffId, TenantId,
};
use crate::domains::audit::models::{AuditLogRow, AuditRecord};
use crate::domains::calendar::models::{
    CalendarEvent, CalendarEventStatus, CalendarRepair, NewCalendarEvent,
};
use crate::domains::catalog::models::{NewService, NewStaff, Service, Staff, Tenant};
use crate::domains::notifications::models::{NewNotification, Notification, NotificationResponse};
use crate::domains::scheduling::models::{Booking, NewSlot, Slot};
use crate::domains::waitlist::models::{NewEntry, WaitlistEntry};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Everything the confirm transition changed, returned in one piece so the
/// caller can build the receipt and enqueue side-effects after commit.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub slot: Slot,
    pub entry: WaitlistEntry,
    pub booking: Booking,
    /// Other active entries for the same phone, soft-removed in the same
    /// transaction.
    pub removed_entry_ids: Vec<EntryId>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn insert_tenant(&self, name: &str, timezone: &str) -> CoreResult<Tenant>;

    async fn insert_staff(&self, tenant: TenantId, staff: NewStaff) -> CoreResult<Staff>;

    async fn insert_service(&self, tenant: TenantId, service: NewService) -> CoreResult<Service>;

    async fn get_staff(&self, tenant: TenantId, id: StaffId) -> CoreResult<Option<Staff>>;

    async fn get_service(&self, tenant: TenantId, id: ServiceId) -> CoreResult<Option<Service>>;

    /// Update a staff member's calendar sync health ('ok' / 'error').
    async fn set_staff_calendar_sync(
        &self,
        tenant: TenantId,
        id: StaffId,
        status: &str,
        error: Option<&str>,
    ) -> CoreResult<()>;

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    /// Insert a new open slot.
    ///
    /// Rejects windows that are inverted, start in the past, or overlap a
    /// non-canceled slot of the same staff member.
    async fn insert_slot(
        &self,
        tenant: TenantId,
        slot: NewSlot,
        now: DateTime<Utc>,
    ) -> CoreResult<Slot>;

    async fn get_slot(&self, tenant: TenantId, id: SlotId) -> CoreResult<Option<Slot>>;

    // ------------------------------------------------------------------
    // Waitlist
    // ------------------------------------------------------------------

    /// Insert a new active entry, enforcing the per-phone cap on
    /// simultaneously active/notified entries within the tenant.
    async fn insert_entry(
        &self,
        tenant: TenantId,
        entry: NewEntry,
        priority_score: i32,
        max_active_per_phone: i64,
    ) -> CoreResult<WaitlistEntry>;

    async fn get_entry(&self, tenant: TenantId, id: EntryId) -> CoreResult<Option<WaitlistEntry>>;

    /// Soft-remove an `active` entry (customer request). Guarded: an entry
    /// that is currently notified, confirmed, or already removed returns
    /// `PreconditionFailed(EntryNotActive)`.
    async fn remove_entry(
        &self,
        tenant: TenantId,
        id: EntryId,
        audit: AuditRecord,
    ) -> CoreResult<WaitlistEntry>;

    /// All `active` entries eligible for the slot: same tenant and service,
    /// staff preference null or matching, slot window inside the entry
    /// window. Pre-sorted by stored priority then age; final ranking happens
    /// in the selector with live scores.
    async fn eligible_entries(
        &self,
        tenant: TenantId,
        slot: &Slot,
    ) -> CoreResult<Vec<WaitlistEntry>>;

    // ------------------------------------------------------------------
    // Transitions (atomic, CAS-guarded)
    // ------------------------------------------------------------------

    /// `open → held` for `entry_id`, and the entry `active → notified`,
    /// in one transaction.
    ///
    /// Guard misses: `SlotNoLongerAvailable` when the slot left `open`;
    /// `EntryNotActive` when the entry moved first (cascade skips it and
    /// tries the next candidate).
    async fn hold_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        expires_at: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<(Slot, WaitlistEntry)>;

    /// `held → booked` for the entry the hold belongs to: slot booked,
    /// entry confirmed, booking row inserted, and every other `active`
    /// entry with the same phone soft-removed, in one transaction.
    ///
    /// Guard misses: `HoldExpired` when this entry's hold ran out but
    /// nothing else claimed the slot yet; `SlotNoLongerAvailable` otherwise.
    async fn confirm_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        now: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<ConfirmOutcome>;

    /// `held → open` on decline: hold cleared, entry back to `active`.
    ///
    /// Guard: the slot must still be held for `entry_id`; otherwise
    /// `SlotNoLongerAvailable` (the caller treats a late decline as a no-op).
    async fn release_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        audit: AuditRecord,
    ) -> CoreResult<Slot>;

    /// `held → open` on expiry: guarded on `hold_expires_at <= now` so a
    /// ticker racing a confirm can never release a freshly-renewed hold.
    /// Returns the released slot and the entry that lost the hold.
    async fn expire_hold(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        now: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<(Slot, WaitlistEntry)>;

    /// `open/held → canceled`. A held slot's entry returns to `active` in
    /// the same transaction. Booked slots are refused
    /// (`SlotNoLongerAvailable`).
    async fn cancel_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        audit: AuditRecord,
    ) -> CoreResult<Slot>;

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// The live (non-canceled) booking for a slot, if any. Used for the
    /// idempotent confirm-token replay.
    async fn booking_for_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
    ) -> CoreResult<Option<Booking>>;

    // ------------------------------------------------------------------
    // System scans (cross-tenant)
    // ------------------------------------------------------------------

    /// A bounded page of held slots whose hold has lapsed at `now`.
    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Slot>>;

    /// Calendar rows needing reconciler attention: status `error`, or
    /// `created` rows whose slot has since been canceled.
    async fn calendar_events_needing_repair(&self, limit: i64)
        -> CoreResult<Vec<CalendarRepair>>;

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    async fn insert_notification(
        &self,
        tenant: TenantId,
        notification: NewNotification,
    ) -> CoreResult<Notification>;

    async fn mark_notification_sent(
        &self,
        tenant: TenantId,
        id: NotificationId,
        provider_id: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn mark_notification_failed(
        &self,
        tenant: TenantId,
        id: NotificationId,
        error: &str,
    ) -> CoreResult<()>;

    /// Record the customer's answer on the most recent offer for
    /// (entry, slot). Best-effort bookkeeping: never alters engine state.
    async fn record_notification_response(
        &self,
        tenant: TenantId,
        entry_id: EntryId,
        slot_id: SlotId,
        response: NotificationResponse,
    ) -> CoreResult<()>;

    // ------------------------------------------------------------------
    // Calendar events
    // ------------------------------------------------------------------

    async fn insert_calendar_event(
        &self,
        tenant: TenantId,
        event: NewCalendarEvent,
    ) -> CoreResult<CalendarEvent>;

    async fn update_calendar_event(
        &self,
        tenant: TenantId,
        id: CalendarEventId,
        status: CalendarEventStatus,
        external_event_id: Option<&str>,
        error: Option<&str>,
    ) -> CoreResult<()>;

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Append an audit record outside any transition (worker summaries,
    /// adapter failures). Transition records ride inside their own
    /// transactions.
    async fn append_audit(&self, record: AuditRecord) -> CoreResult<()>;

    async fn list_audit(&self, tenant: TenantId, limit: i64) -> CoreResult<Vec<AuditLogRow>>;
}
