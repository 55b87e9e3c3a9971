//! In-memory store for tests.
//!
//! A single mutex over the whole state makes every method atomic, which is
//! exactly the contract the Postgres store provides per-transaction. The
//! guards and error classification mirror `PgStore` line for line, so engine
//! tests and interleaving tests exercise the real transition semantics
//! without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{
    BookingId, CalendarEventId, CoreError, CoreResult, EntryId, NotificationId, Precondition,
    ServiceId, SlotId, StaffId, TenantId,
};
use crate::domains::audit::models::{AuditLogRow, AuditRecord};
use crate::domains::calendar::models::{
    CalendarEvent, CalendarEventStatus, CalendarRepair, NewCalendarEvent,
};
use crate::domains::catalog::models::{NewService, NewStaff, Service, Staff, Tenant};
use crate::domains::notifications::models::{
    NewNotification, Notification, NotificationResponse, NotificationStatus,
};
use crate::domains::scheduling::models::{
    Booking, BookingSource, BookingStatus, NewSlot, Slot, SlotStatus,
};
use crate::domains::waitlist::models::{EntryStatus, NewEntry, WaitlistEntry};

use super::{ConfirmOutcome, Store};

#[derive(Default)]
struct State {
    tenants: HashMap<TenantId, Tenant>,
    staff: HashMap<StaffId, Staff>,
    services: HashMap<ServiceId, Service>,
    slots: HashMap<SlotId, Slot>,
    entries: HashMap<EntryId, WaitlistEntry>,
    bookings: HashMap<BookingId, Booking>,
    notifications: HashMap<NotificationId, Notification>,
    calendar_events: HashMap<CalendarEventId, CalendarEvent>,
    audit: Vec<AuditLogRow>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push_audit(state: &mut State, record: &AuditRecord) {
        state.audit.push(AuditLogRow {
            id: crate::common::AuditLogId::new(),
            tenant_id: record.tenant_id,
            actor_type: record.actor.actor_type,
            actor_id: record.actor.actor_id,
            action: record.action.clone(),
            resource_type: record.resource_type.clone(),
            resource_id: record.resource_id,
            metadata: record.metadata.clone(),
            created_at: Utc::now(),
        });
    }

    /// Test helper: rewrite an entry's `created_at` so scenarios can pin
    /// waitlist tenure and FIFO order.
    pub fn backdate_entry(&self, id: EntryId, created_at: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(&id) {
            entry.created_at = created_at;
        }
    }

    /// Test helper: a snapshot of every notification row.
    pub fn notifications_snapshot(&self) -> Vec<Notification> {
        let state = self.lock();
        let mut rows: Vec<_> = state.notifications.values().cloned().collect();
        rows.sort_by_key(|n| n.created_at);
        rows
    }

    /// Test helper: a snapshot of every calendar event row.
    pub fn calendar_snapshot(&self) -> Vec<CalendarEvent> {
        let state = self.lock();
        let mut rows: Vec<_> = state.calendar_events.values().cloned().collect();
        rows.sort_by_key(|e| e.created_at);
        rows
    }
}

#[async_trait]
impl Store for MemoryStore {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn insert_tenant(&self, name: &str, timezone: &str) -> CoreResult<Tenant> {
        let mut state = self.lock();
        let tenant = Tenant {
            id: TenantId::new(),
            name: name.to_string(),
            timezone: timezone.to_string(),
            created_at: Utc::now(),
        };
        state.tenants.insert(tenant.id, tenant.clone());
        Ok(tenant)
    }

    async fn insert_staff(&self, tenant: TenantId, staff: NewStaff) -> CoreResult<Staff> {
        let mut state = self.lock();
        let row = Staff {
            id: StaffId::new(),
            tenant_id: tenant,
            name: staff.name,
            email: staff.email,
            calendar_sync_status: "ok".to_string(),
            calendar_last_error: None,
            created_at: Utc::now(),
        };
        state.staff.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_service(&self, tenant: TenantId, service: NewService) -> CoreResult<Service> {
        let mut state = self.lock();
        let row = Service {
            id: ServiceId::new(),
            tenant_id: tenant,
            name: service.name,
            duration_minutes: service.duration_minutes,
            price: service.price,
            created_at: Utc::now(),
        };
        state.services.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_staff(&self, tenant: TenantId, id: StaffId) -> CoreResult<Option<Staff>> {
        let state = self.lock();
        Ok(state
            .staff
            .get(&id)
            .filter(|s| s.tenant_id == tenant)
            .cloned())
    }

    async fn get_service(&self, tenant: TenantId, id: ServiceId) -> CoreResult<Option<Service>> {
        let state = self.lock();
        Ok(state
            .services
            .get(&id)
            .filter(|s| s.tenant_id == tenant)
            .cloned())
    }

    async fn set_staff_calendar_sync(
        &self,
        tenant: TenantId,
        id: StaffId,
        status: &str,
        error: Option<&str>,
    ) -> CoreResult<()> {
        let mut state = self.lock();
        if let Some(staff) = state
            .staff
            .get_mut(&id)
            .filter(|s| s.tenant_id == tenant)
        {
            staff.calendar_sync_status = status.to_string();
            staff.calendar_last_error = error.map(String::from);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    async fn insert_slot(
        &self,
        tenant: TenantId,
        slot: NewSlot,
        now: DateTime<Utc>,
    ) -> CoreResult<Slot> {
        if slot.start_time >= slot.end_time {
            return Err(CoreError::Conflict("slot must start before it ends".into()));
        }
        if slot.start_time <= now {
            return Err(CoreError::Conflict("slot must start in the future".into()));
        }

        let mut state = self.lock();

        if !state
            .staff
            .get(&slot.staff_id)
            .map(|s| s.tenant_id == tenant)
            .unwrap_or(false)
        {
            return Err(CoreError::NotFound("staff"));
        }
        if !state
            .services
            .get(&slot.service_id)
            .map(|s| s.tenant_id == tenant)
            .unwrap_or(false)
        {
            return Err(CoreError::NotFound("service"));
        }

        let overlaps = state.slots.values().any(|s| {
            s.tenant_id == tenant
                && s.staff_id == slot.staff_id
                && s.status != SlotStatus::Canceled
                && s.start_time < slot.end_time
                && s.end_time > slot.start_time
        });
        if overlaps {
            return Err(CoreError::Conflict(
                "slot overlaps an existing slot for this staff".into(),
            ));
        }

        let created = Slot {
            id: SlotId::new(),
            tenant_id: tenant,
            staff_id: slot.staff_id,
            service_id: slot.service_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: SlotStatus::Open,
            hold_expires_at: None,
            held_entry_id: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.slots.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_slot(&self, tenant: TenantId, id: SlotId) -> CoreResult<Option<Slot>> {
        let state = self.lock();
        Ok(state
            .slots
            .get(&id)
            .filter(|s| s.tenant_id == tenant)
            .cloned())
    }

    // ------------------------------------------------------------------
    // Waitlist
    // ------------------------------------------------------------------

    async fn insert_entry(
        &self,
        tenant: TenantId,
        entry: NewEntry,
        priority_score: i32,
        max_active_per_phone: i64,
    ) -> CoreResult<WaitlistEntry> {
        if entry.earliest_time >= entry.latest_time {
            return Err(CoreError::Conflict(
                "waitlist window must start before it ends".into(),
            ));
        }

        let mut state = self.lock();

        let live = state
            .entries
            .values()
            .filter(|e| {
                e.tenant_id == tenant
                    && e.phone == entry.phone
                    && matches!(e.status, EntryStatus::Active | EntryStatus::Notified)
            })
            .count() as i64;
        if live >= max_active_per_phone {
            return Err(CoreError::Conflict(format!(
                "phone already has {} open waitlist entries",
                live
            )));
        }

        let created = WaitlistEntry {
            id: EntryId::new(),
            tenant_id: tenant,
            customer_name: entry.customer_name,
            phone: entry.phone,
            email: entry.email,
            service_id: entry.service_id,
            staff_id: entry.staff_id,
            earliest_time: entry.earliest_time,
            latest_time: entry.latest_time,
            vip: entry.vip,
            priority_score,
            status: EntryStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.entries.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_entry(&self, tenant: TenantId, id: EntryId) -> CoreResult<Option<WaitlistEntry>> {
        let state = self.lock();
        Ok(state
            .entries
            .get(&id)
            .filter(|e| e.tenant_id == tenant)
            .cloned())
    }

    async fn remove_entry(
        &self,
        tenant: TenantId,
        id: EntryId,
        audit: AuditRecord,
    ) -> CoreResult<WaitlistEntry> {
        let mut state = self.lock();

        let entry = match state.entries.get_mut(&id).filter(|e| e.tenant_id == tenant) {
            Some(entry) => entry,
            None => return Err(CoreError::NotFound("waitlist entry")),
        };
        if entry.status != EntryStatus::Active {
            return Err(CoreError::PreconditionFailed(Precondition::EntryNotActive));
        }

        entry.status = EntryStatus::Removed;
        entry.updated_at = Utc::now();
        let removed = entry.clone();

        Self::push_audit(&mut state, &audit);
        Ok(removed)
    }

    async fn eligible_entries(
        &self,
        tenant: TenantId,
        slot: &Slot,
    ) -> CoreResult<Vec<WaitlistEntry>> {
        let state = self.lock();
        let mut matches: Vec<WaitlistEntry> = state
            .entries
            .values()
            .filter(|e| {
                e.tenant_id == tenant
                    && e.service_id == slot.service_id
                    && e.status == EntryStatus::Active
                    && e.staff_id.map(|s| s == slot.staff_id).unwrap_or(true)
                    && e.earliest_time <= slot.start_time
                    && e.latest_time >= slot.end_time
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.priority_score
                .cmp(&a.priority_score)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(matches)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    async fn hold_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        expires_at: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<(Slot, WaitlistEntry)> {
        let mut state = self.lock();

        let slot = match state.slots.get(&slot_id).filter(|s| s.tenant_id == tenant) {
            Some(slot) => slot.clone(),
            None => return Err(CoreError::NotFound("slot")),
        };
        if slot.status != SlotStatus::Open {
            return Err(CoreError::PreconditionFailed(
                Precondition::SlotNoLongerAvailable,
            ));
        }

        let entry = match state.entries.get(&entry_id).filter(|e| e.tenant_id == tenant) {
            Some(entry) => entry.clone(),
            None => return Err(CoreError::NotFound("waitlist entry")),
        };
        if entry.status != EntryStatus::Active {
            return Err(CoreError::PreconditionFailed(Precondition::EntryNotActive));
        }

        let slot = {
            let s = state.slots.get_mut(&slot_id).expect("checked above");
            s.status = SlotStatus::Held;
            s.hold_expires_at = Some(expires_at);
            s.held_entry_id = Some(entry_id);
            s.version += 1;
            s.updated_at = Utc::now();
            s.clone()
        };
        let entry = {
            let e = state.entries.get_mut(&entry_id).expect("checked above");
            e.status = EntryStatus::Notified;
            e.updated_at = Utc::now();
            e.clone()
        };

        Self::push_audit(&mut state, &audit);
        Ok((slot, entry))
    }

    async fn confirm_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        now: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<ConfirmOutcome> {
        let mut state = self.lock();

        let slot = match state.slots.get(&slot_id).filter(|s| s.tenant_id == tenant) {
            Some(slot) => slot.clone(),
            None => return Err(CoreError::NotFound("slot")),
        };

        let holds_for_entry =
            slot.status == SlotStatus::Held && slot.held_entry_id == Some(entry_id);
        let live = slot.hold_expires_at.map(|t| t > now).unwrap_or(false);
        if !(holds_for_entry && live) {
            if holds_for_entry {
                return Err(CoreError::PreconditionFailed(Precondition::HoldExpired));
            }
            // An entry bounced back to `active` lost its hold to the expiry
            // tick; the customer should hear "hold expired", not "someone
            // else got it".
            let bounced = state
                .entries
                .get(&entry_id)
                .map(|e| e.status == EntryStatus::Active)
                .unwrap_or(false);
            if bounced {
                return Err(CoreError::PreconditionFailed(Precondition::HoldExpired));
            }
            return Err(CoreError::PreconditionFailed(
                Precondition::SlotNoLongerAvailable,
            ));
        }

        let entry = match state.entries.get(&entry_id) {
            Some(entry) if entry.status == EntryStatus::Notified => entry.clone(),
            _ => {
                return Err(CoreError::invariant(
                    "held slot references an entry that is not notified",
                ))
            }
        };

        let existing = state
            .bookings
            .values()
            .any(|b| b.slot_id == slot_id && b.status != BookingStatus::Canceled);
        if existing {
            return Err(CoreError::Conflict("booking already exists for slot".into()));
        }

        let slot = {
            let s = state.slots.get_mut(&slot_id).expect("checked above");
            s.status = SlotStatus::Booked;
            s.hold_expires_at = None;
            s.held_entry_id = None;
            s.version += 1;
            s.updated_at = Utc::now();
            s.clone()
        };
        let entry = {
            let e = state.entries.get_mut(&entry_id).expect("checked above");
            e.status = EntryStatus::Confirmed;
            e.updated_at = Utc::now();
            e.clone()
        };

        let booking = Booking {
            id: BookingId::new(),
            tenant_id: tenant,
            slot_id,
            waitlist_entry_id: Some(entry_id),
            customer_name: entry.customer_name.clone(),
            customer_phone: entry.phone.clone(),
            customer_email: entry.email.clone(),
            status: BookingStatus::Confirmed,
            source: BookingSource::Waitlist,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.bookings.insert(booking.id, booking.clone());

        let phone = entry.phone.clone();
        let mut removed_entry_ids = Vec::new();
        for other in state.entries.values_mut() {
            if other.tenant_id == tenant
                && other.phone == phone
                && other.status == EntryStatus::Active
                && other.id != entry_id
            {
                other.status = EntryStatus::Removed;
                other.updated_at = Utc::now();
                removed_entry_ids.push(other.id);
            }
        }

        Self::push_audit(&mut state, &audit);
        Ok(ConfirmOutcome {
            slot,
            entry,
            booking,
            removed_entry_ids,
        })
    }

    async fn release_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        audit: AuditRecord,
    ) -> CoreResult<Slot> {
        let mut state = self.lock();

        let slot = match state.slots.get(&slot_id).filter(|s| s.tenant_id == tenant) {
            Some(slot) => slot.clone(),
            None => return Err(CoreError::NotFound("slot")),
        };
        if !(slot.status == SlotStatus::Held && slot.held_entry_id == Some(entry_id)) {
            return Err(CoreError::PreconditionFailed(
                Precondition::SlotNoLongerAvailable,
            ));
        }

        match state.entries.get(&entry_id) {
            Some(entry) if entry.status == EntryStatus::Notified => {}
            _ => {
                return Err(CoreError::invariant(
                    "held slot references an entry that is not notified",
                ))
            }
        }

        let slot = {
            let s = state.slots.get_mut(&slot_id).expect("checked above");
            s.status = SlotStatus::Open;
            s.hold_expires_at = None;
            s.held_entry_id = None;
            s.version += 1;
            s.updated_at = Utc::now();
            s.clone()
        };
        {
            let e = state.entries.get_mut(&entry_id).expect("checked above");
            e.status = EntryStatus::Active;
            e.updated_at = Utc::now();
        }

        Self::push_audit(&mut state, &audit);
        Ok(slot)
    }

    async fn expire_hold(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        now: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<(Slot, WaitlistEntry)> {
        let mut state = self.lock();

        let slot = match state.slots.get(&slot_id).filter(|s| s.tenant_id == tenant) {
            Some(slot) => slot.clone(),
            None => return Err(CoreError::NotFound("slot")),
        };

        let lapsed = slot.status == SlotStatus::Held
            && slot.hold_expires_at.map(|t| t <= now).unwrap_or(false);
        if !lapsed {
            return Err(CoreError::PreconditionFailed(
                Precondition::SlotNoLongerAvailable,
            ));
        }

        let entry_id = slot
            .held_entry_id
            .ok_or_else(|| CoreError::invariant("held slot is missing its held_entry_id"))?;

        match state.entries.get(&entry_id) {
            Some(entry) if entry.status == EntryStatus::Notified => {}
            _ => {
                return Err(CoreError::invariant(
                    "held slot references an entry that is not notified",
                ))
            }
        }

        let slot = {
            let s = state.slots.get_mut(&slot_id).expect("checked above");
            s.status = SlotStatus::Open;
            s.hold_expires_at = None;
            s.held_entry_id = None;
            s.version += 1;
            s.updated_at = Utc::now();
            s.clone()
        };
        let entry = {
            let e = state.entries.get_mut(&entry_id).expect("checked above");
            e.status = EntryStatus::Active;
            e.updated_at = Utc::now();
            e.clone()
        };

        Self::push_audit(&mut state, &audit);
        Ok((slot, entry))
    }

    async fn cancel_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        audit: AuditRecord,
    ) -> CoreResult<Slot> {
        let mut state = self.lock();

        let slot = match state.slots.get(&slot_id).filter(|s| s.tenant_id == tenant) {
            Some(slot) => slot.clone(),
            None => return Err(CoreError::NotFound("slot")),
        };

        match slot.status {
            SlotStatus::Canceled => return Ok(slot),
            SlotStatus::Booked => {
                return Err(CoreError::PreconditionFailed(
                    Precondition::SlotNoLongerAvailable,
                ))
            }
            SlotStatus::Open | SlotStatus::Held => {}
        }

        if let Some(entry_id) = slot.held_entry_id {
            if let Some(e) = state.entries.get_mut(&entry_id) {
                if e.status == EntryStatus::Notified {
                    e.status = EntryStatus::Active;
                    e.updated_at = Utc::now();
                }
            }
        }

        let slot = {
            let s = state.slots.get_mut(&slot_id).expect("checked above");
            s.status = SlotStatus::Canceled;
            s.hold_expires_at = None;
            s.held_entry_id = None;
            s.version += 1;
            s.updated_at = Utc::now();
            s.clone()
        };

        Self::push_audit(&mut state, &audit);
        Ok(slot)
    }

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    async fn booking_for_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
    ) -> CoreResult<Option<Booking>> {
        let state = self.lock();
        Ok(state
            .bookings
            .values()
            .find(|b| {
                b.tenant_id == tenant
                    && b.slot_id == slot_id
                    && b.status != BookingStatus::Canceled
            })
            .cloned())
    }

    // ------------------------------------------------------------------
    // System scans
    // ------------------------------------------------------------------

    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Slot>> {
        let state = self.lock();
        let mut expired: Vec<Slot> = state
            .slots
            .values()
            .filter(|s| {
                s.status == SlotStatus::Held
                    && s.hold_expires_at.map(|t| t <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        expired.sort_by_key(|s| s.hold_expires_at);
        expired.truncate(limit as usize);
        Ok(expired)
    }

    async fn calendar_events_needing_repair(
        &self,
        limit: i64,
    ) -> CoreResult<Vec<CalendarRepair>> {
        let state = self.lock();
        let mut repairs: Vec<CalendarRepair> = state
            .calendar_events
            .values()
            .filter_map(|event| {
                let slot = state.slots.get(&event.slot_id)?;
                let needs_repair = event.status == CalendarEventStatus::Error
                    || (event.status == CalendarEventStatus::Created
                        && slot.status == SlotStatus::Canceled);
                needs_repair.then(|| CalendarRepair {
                    event: event.clone(),
                    slot_status: slot.status,
                })
            })
            .collect();
        repairs.sort_by_key(|r| r.event.updated_at);
        repairs.truncate(limit as usize);
        Ok(repairs)
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    async fn insert_notification(
        &self,
        tenant: TenantId,
        notification: NewNotification,
    ) -> CoreResult<Notification> {
        let mut state = self.lock();
        let row = Notification {
            id: NotificationId::new(),
            tenant_id: tenant,
            entry_id: notification.entry_id,
            slot_id: notification.slot_id,
            channel: notification.channel,
            status: NotificationStatus::Pending,
            token_digest: notification.token_digest,
            provider_id: None,
            error: None,
            sent_at: None,
            response: None,
            created_at: Utc::now(),
        };
        state.notifications.insert(row.id, row.clone());
        Ok(row)
    }

    async fn mark_notification_sent(
        &self,
        tenant: TenantId,
        id: NotificationId,
        provider_id: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut state = self.lock();
        if let Some(n) = state
            .notifications
            .get_mut(&id)
            .filter(|n| n.tenant_id == tenant)
        {
            n.status = NotificationStatus::Sent;
            n.provider_id = provider_id.map(String::from);
            n.sent_at = Some(sent_at);
            n.error = None;
        }
        Ok(())
    }

    async fn mark_notification_failed(
        &self,
        tenant: TenantId,
        id: NotificationId,
        error: &str,
    ) -> CoreResult<()> {
        let mut state = self.lock();
        if let Some(n) = state
            .notifications
            .get_mut(&id)
            .filter(|n| n.tenant_id == tenant)
        {
            n.status = NotificationStatus::Failed;
            n.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn record_notification_response(
        &self,
        tenant: TenantId,
        entry_id: EntryId,
        slot_id: SlotId,
        response: NotificationResponse,
    ) -> CoreResult<()> {
        let mut state = self.lock();
        let latest = state
            .notifications
            .values_mut()
            .filter(|n| {
                n.tenant_id == tenant && n.entry_id == entry_id && n.slot_id == slot_id
            })
            .max_by_key(|n| n.created_at);
        if let Some(n) = latest {
            n.response = Some(response);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Calendar events
    // ------------------------------------------------------------------

    async fn insert_calendar_event(
        &self,
        tenant: TenantId,
        event: NewCalendarEvent,
    ) -> CoreResult<CalendarEvent> {
        let mut state = self.lock();
        let row = CalendarEvent {
            id: CalendarEventId::new(),
            tenant_id: tenant,
            slot_id: event.slot_id,
            staff_id: event.staff_id,
            external_event_id: event.external_event_id,
            status: event.status,
            error: event.error,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.calendar_events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_calendar_event(
        &self,
        tenant: TenantId,
        id: CalendarEventId,
        status: CalendarEventStatus,
        external_event_id: Option<&str>,
        error: Option<&str>,
    ) -> CoreResult<()> {
        let mut state = self.lock();
        if let Some(event) = state
            .calendar_events
            .get_mut(&id)
            .filter(|e| e.tenant_id == tenant)
        {
            event.status = status;
            if let Some(ext) = external_event_id {
                event.external_event_id = Some(ext.to_string());
            }
            event.error = error.map(String::from);
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    async fn append_audit(&self, record: AuditRecord) -> CoreResult<()> {
        let mut state = self.lock();
        Self::push_audit(&mut state, &record);
        Ok(())
    }

    async fn list_audit(&self, tenant: TenantId, limit: i64) -> CoreResult<Vec<AuditLogRow>> {
        let state = self.lock();
        let mut rows: Vec<AuditLogRow> = state
            .audit
            .iter()
            .filter(|r| r.tenant_id == tenant)
            .cloned()
            .collect();
        rows.reverse();
        rows.truncate(limit as usize);
        Ok(rows)
    }
}
