//! Postgres-backed store.
//!
//! Every transition runs in a single transaction and writes through a
//! guarded UPDATE, so concurrent writers serialize on the row and exactly
//! one observes success. Guard misses are classified inside the transaction
//! (the row is re-read under the same snapshot) before rolling back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::{
    CalendarEventId, CoreError, CoreResult, EntryId, NotificationId, Precondition, ServiceId,
    SlotId, StaffId, TenantId,
};
use crate::domains::audit::models::{AuditLogRow, AuditRecord};
use crate::domains::calendar::models::{
    CalendarEvent, CalendarEventStatus, CalendarRepair, NewCalendarEvent,
};
use crate::domains::catalog::models::{NewService, NewStaff, Service, Staff, Tenant};
use crate::domains::notifications::models::{NewNotification, Notification, NotificationResponse};
use crate::domains::scheduling::models::{Booking, NewSlot, Slot, SlotStatus};
use crate::domains::waitlist::models::{NewEntry, WaitlistEntry};

use super::{ConfirmOutcome, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Append an audit row inside an open transaction.
    async fn append_audit_tx(
        tx: &mut Transaction<'_, Postgres>,
        record: &AuditRecord,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, tenant_id, actor_type, actor_id, action, resource_type, resource_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::now_v7())
        .bind(record.tenant_id)
        .bind(record.actor.actor_type)
        .bind(record.actor.actor_id)
        .bind(&record.action)
        .bind(&record.resource_type)
        .bind(record.resource_id)
        .bind(&record.metadata)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Re-read a slot inside the transaction to name what the missed guard
    /// actually hit.
    async fn classify_slot_miss(
        tx: &mut Transaction<'_, Postgres>,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: Option<EntryId>,
        now: Option<DateTime<Utc>>,
    ) -> CoreError {
        let slot: Result<Option<Slot>, _> =
            sqlx::query_as("SELECT * FROM slots WHERE tenant_id = $1 AND id = $2")
                .bind(tenant)
                .bind(slot_id)
                .fetch_optional(&mut **tx)
                .await;

        match slot {
            Ok(None) => CoreError::NotFound("slot"),
            Ok(Some(slot)) => {
                // A hold that belongs to the caller but lapsed gets the
                // precise answer; everything else is "someone else got it".
                if let (Some(entry_id), Some(now)) = (entry_id, now) {
                    if slot.status == SlotStatus::Held
                        && slot.held_entry_id == Some(entry_id)
                        && slot.hold_expires_at.map(|t| t <= now).unwrap_or(false)
                    {
                        return CoreError::PreconditionFailed(Precondition::HoldExpired);
                    }
                }
                CoreError::PreconditionFailed(Precondition::SlotNoLongerAvailable)
            }
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn insert_tenant(&self, name: &str, timezone: &str) -> CoreResult<Tenant> {
        sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, name, timezone) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(TenantId::new())
        .bind(name)
        .bind(timezone)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_staff(&self, tenant: TenantId, staff: NewStaff) -> CoreResult<Staff> {
        sqlx::query_as::<_, Staff>(
            "INSERT INTO staff (id, tenant_id, name, email) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(StaffId::new())
        .bind(tenant)
        .bind(&staff.name)
        .bind(&staff.email)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn insert_service(&self, tenant: TenantId, service: NewService) -> CoreResult<Service> {
        sqlx::query_as::<_, Service>(
            "INSERT INTO services (id, tenant_id, name, duration_minutes, price)
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(ServiceId::new())
        .bind(tenant)
        .bind(&service.name)
        .bind(service.duration_minutes)
        .bind(service.price)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn get_staff(&self, tenant: TenantId, id: StaffId) -> CoreResult<Option<Staff>> {
        sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn get_service(&self, tenant: TenantId, id: ServiceId) -> CoreResult<Option<Service>> {
        sqlx::query_as::<_, Service>("SELECT * FROM services WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn set_staff_calendar_sync(
        &self,
        tenant: TenantId,
        id: StaffId,
        status: &str,
        error: Option<&str>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE staff SET calendar_sync_status = $3, calendar_last_error = $4
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .bind(status)
        .bind(error)
        .execute(&self.pool)
        .await?;

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

        let mut tx = self.pool.begin().await?;

        // Lock the staff row so concurrent inserts for the same staff
        // serialize on the overlap check.
        let staff: Option<(StaffId,)> =
            sqlx::query_as("SELECT id FROM staff WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
                .bind(tenant)
                .bind(slot.staff_id)
                .fetch_optional(&mut *tx)
                .await?;
        if staff.is_none() {
            tx.rollback().await?;
            return Err(CoreError::NotFound("staff"));
        }

        let service: Option<(ServiceId,)> =
            sqlx::query_as("SELECT id FROM services WHERE tenant_id = $1 AND id = $2")
                .bind(tenant)
                .bind(slot.service_id)
                .fetch_optional(&mut *tx)
                .await?;
        if service.is_none() {
            tx.rollback().await?;
            return Err(CoreError::NotFound("service"));
        }

        let (overlaps,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM slots
                WHERE tenant_id = $1 AND staff_id = $2 AND status <> 'canceled'
                  AND start_time < $4 AND end_time > $3
             )",
        )
        .bind(tenant)
        .bind(slot.staff_id)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .fetch_one(&mut *tx)
        .await?;

        if overlaps {
            tx.rollback().await?;
            return Err(CoreError::Conflict(
                "slot overlaps an existing slot for this staff".into(),
            ));
        }

        let created = sqlx::query_as::<_, Slot>(
            "INSERT INTO slots (id, tenant_id, staff_id, service_id, start_time, end_time, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'open') RETURNING *",
        )
        .bind(SlotId::new())
        .bind(tenant)
        .bind(slot.staff_id)
        .bind(slot.service_id)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn get_slot(&self, tenant: TenantId, id: SlotId) -> CoreResult<Option<Slot>> {
        sqlx::query_as::<_, Slot>("SELECT * FROM slots WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
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

        let mut tx = self.pool.begin().await?;

        // Lock this phone's live entries so two concurrent joins can't both
        // slip under the cap.
        let live: Vec<(EntryId,)> = sqlx::query_as(
            "SELECT id FROM waitlist_entries
             WHERE tenant_id = $1 AND phone = $2 AND status IN ('active', 'notified')
             FOR UPDATE",
        )
        .bind(tenant)
        .bind(&entry.phone)
        .fetch_all(&mut *tx)
        .await?;

        if live.len() as i64 >= max_active_per_phone {
            tx.rollback().await?;
            return Err(CoreError::Conflict(format!(
                "phone already has {} open waitlist entries",
                live.len()
            )));
        }

        let created = sqlx::query_as::<_, WaitlistEntry>(
            "INSERT INTO waitlist_entries (
                id, tenant_id, customer_name, phone, email, service_id, staff_id,
                earliest_time, latest_time, vip, priority_score, status
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'active')
             RETURNING *",
        )
        .bind(EntryId::new())
        .bind(tenant)
        .bind(&entry.customer_name)
        .bind(&entry.phone)
        .bind(&entry.email)
        .bind(entry.service_id)
        .bind(entry.staff_id)
        .bind(entry.earliest_time)
        .bind(entry.latest_time)
        .bind(entry.vip)
        .bind(priority_score)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn get_entry(&self, tenant: TenantId, id: EntryId) -> CoreResult<Option<WaitlistEntry>> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn remove_entry(
        &self,
        tenant: TenantId,
        id: EntryId,
        audit: AuditRecord,
    ) -> CoreResult<WaitlistEntry> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, WaitlistEntry>(
            "UPDATE waitlist_entries SET status = 'removed', updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'active'
             RETURNING *",
        )
        .bind(tenant)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let entry = match updated {
            Some(entry) => entry,
            None => {
                let exists: Option<(EntryId,)> =
                    sqlx::query_as("SELECT id FROM waitlist_entries WHERE tenant_id = $1 AND id = $2")
                        .bind(tenant)
                        .bind(id)
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;
                return Err(match exists {
                    Some(_) => CoreError::PreconditionFailed(Precondition::EntryNotActive),
                    None => CoreError::NotFound("waitlist entry"),
                });
            }
        };

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(entry)
    }

    async fn eligible_entries(
        &self,
        tenant: TenantId,
        slot: &Slot,
    ) -> CoreResult<Vec<WaitlistEntry>> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries
             WHERE tenant_id = $1
               AND service_id = $2
               AND status = 'active'
               AND (staff_id IS NULL OR staff_id = $3)
               AND earliest_time <= $4
               AND latest_time >= $5
             ORDER BY priority_score DESC, created_at ASC",
        )
        .bind(tenant)
        .bind(slot.service_id)
        .bind(slot.staff_id)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
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
        let mut tx = self.pool.begin().await?;

        let slot = sqlx::query_as::<_, Slot>(
            "UPDATE slots
             SET status = 'held', hold_expires_at = $3, held_entry_id = $4,
                 version = version + 1, updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'open'
             RETURNING *",
        )
        .bind(tenant)
        .bind(slot_id)
        .bind(expires_at)
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        let slot = match slot {
            Some(slot) => slot,
            None => {
                let err = Self::classify_slot_miss(&mut tx, tenant, slot_id, None, None).await;
                tx.rollback().await?;
                return Err(err);
            }
        };

        let entry = sqlx::query_as::<_, WaitlistEntry>(
            "UPDATE waitlist_entries SET status = 'notified', updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'active'
             RETURNING *",
        )
        .bind(tenant)
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        let entry = match entry {
            Some(entry) => entry,
            None => {
                // Rolls the slot update back too; the cascade skips this
                // candidate and tries the next one.
                let exists: Option<(EntryId,)> =
                    sqlx::query_as("SELECT id FROM waitlist_entries WHERE tenant_id = $1 AND id = $2")
                        .bind(tenant)
                        .bind(entry_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                tx.rollback().await?;
                return Err(match exists {
                    Some(_) => CoreError::PreconditionFailed(Precondition::EntryNotActive),
                    None => CoreError::NotFound("waitlist entry"),
                });
            }
        };

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await?;

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
        let mut tx = self.pool.begin().await?;

        let slot = sqlx::query_as::<_, Slot>(
            "UPDATE slots
             SET status = 'booked', hold_expires_at = NULL, held_entry_id = NULL,
                 version = version + 1, updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'held'
               AND held_entry_id = $3 AND hold_expires_at > $4
             RETURNING *",
        )
        .bind(tenant)
        .bind(slot_id)
        .bind(entry_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let slot = match slot {
            Some(slot) => slot,
            None => {
                let mut err =
                    Self::classify_slot_miss(&mut tx, tenant, slot_id, Some(entry_id), Some(now))
                        .await;
                // An entry bounced back to `active` lost its hold to the
                // expiry tick; the customer should hear "hold expired",
                // not "someone else got it".
                if matches!(
                    err,
                    CoreError::PreconditionFailed(Precondition::SlotNoLongerAvailable)
                ) {
                    let entry: Option<WaitlistEntry> = sqlx::query_as(
                        "SELECT * FROM waitlist_entries WHERE tenant_id = $1 AND id = $2",
                    )
                    .bind(tenant)
                    .bind(entry_id)
                    .fetch_optional(&mut *tx)
                    .await?;
                    if entry
                        .map(|e| e.status == crate::domains::waitlist::models::EntryStatus::Active)
                        .unwrap_or(false)
                    {
                        err = CoreError::PreconditionFailed(Precondition::HoldExpired);
                    }
                }
                tx.rollback().await?;
                return Err(err);
            }
        };

        let entry = sqlx::query_as::<_, WaitlistEntry>(
            "UPDATE waitlist_entries SET status = 'confirmed', updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'notified'
             RETURNING *",
        )
        .bind(tenant)
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        let entry = match entry {
            Some(entry) => entry,
            None => {
                tx.rollback().await?;
                return Err(CoreError::invariant(
                    "held slot references an entry that is not notified",
                ));
            }
        };

        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (
                id, tenant_id, slot_id, waitlist_entry_id,
                customer_name, customer_phone, customer_email, status, source
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'confirmed', 'waitlist')
             RETURNING *",
        )
        .bind(crate::common::BookingId::new())
        .bind(tenant)
        .bind(slot_id)
        .bind(entry_id)
        .bind(&entry.customer_name)
        .bind(&entry.phone)
        .bind(&entry.email)
        .fetch_one(&mut *tx)
        .await?;

        // The customer got their appointment; their other open requests in
        // this tenant are finished.
        let removed: Vec<(EntryId,)> = sqlx::query_as(
            "UPDATE waitlist_entries SET status = 'removed', updated_at = now()
             WHERE tenant_id = $1 AND phone = $2 AND status = 'active' AND id <> $3
             RETURNING id",
        )
        .bind(tenant)
        .bind(&entry.phone)
        .bind(entry_id)
        .fetch_all(&mut *tx)
        .await?;

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(ConfirmOutcome {
            slot,
            entry,
            booking,
            removed_entry_ids: removed.into_iter().map(|(id,)| id).collect(),
        })
    }

    async fn release_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        entry_id: EntryId,
        audit: AuditRecord,
    ) -> CoreResult<Slot> {
        let mut tx = self.pool.begin().await?;

        let slot = sqlx::query_as::<_, Slot>(
            "UPDATE slots
             SET status = 'open', hold_expires_at = NULL, held_entry_id = NULL,
                 version = version + 1, updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'held' AND held_entry_id = $3
             RETURNING *",
        )
        .bind(tenant)
        .bind(slot_id)
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        let slot = match slot {
            Some(slot) => slot,
            None => {
                let err = Self::classify_slot_miss(&mut tx, tenant, slot_id, None, None).await;
                tx.rollback().await?;
                return Err(err);
            }
        };

        let released = sqlx::query(
            "UPDATE waitlist_entries SET status = 'active', updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'notified'",
        )
        .bind(tenant)
        .bind(entry_id)
        .execute(&mut *tx)
        .await?;

        if released.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(CoreError::invariant(
                "held slot references an entry that is not notified",
            ));
        }

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok(slot)
    }

    async fn expire_hold(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        now: DateTime<Utc>,
        audit: AuditRecord,
    ) -> CoreResult<(Slot, WaitlistEntry)> {
        let mut tx = self.pool.begin().await?;

        // Lock first: the RETURNING row would already have the hold fields
        // cleared, and we need the entry that lost the hold.
        let current: Option<Slot> =
            sqlx::query_as("SELECT * FROM slots WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
                .bind(tenant)
                .bind(slot_id)
                .fetch_optional(&mut *tx)
                .await?;

        let current = match current {
            Some(slot) => slot,
            None => {
                tx.rollback().await?;
                return Err(CoreError::NotFound("slot"));
            }
        };

        let lapsed = current.status == SlotStatus::Held
            && current.hold_expires_at.map(|t| t <= now).unwrap_or(false);
        if !lapsed {
            // Confirm (or another ticker) won the race.
            tx.rollback().await?;
            return Err(CoreError::PreconditionFailed(
                Precondition::SlotNoLongerAvailable,
            ));
        }

        let entry_id = current.held_entry_id.ok_or_else(|| {
            CoreError::invariant("held slot is missing its held_entry_id")
        })?;

        let slot = sqlx::query_as::<_, Slot>(
            "UPDATE slots
             SET status = 'open', hold_expires_at = NULL, held_entry_id = NULL,
                 version = version + 1, updated_at = now()
             WHERE tenant_id = $1 AND id = $2
             RETURNING *",
        )
        .bind(tenant)
        .bind(slot_id)
        .fetch_one(&mut *tx)
        .await?;

        let entry = sqlx::query_as::<_, WaitlistEntry>(
            "UPDATE waitlist_entries SET status = 'active', updated_at = now()
             WHERE tenant_id = $1 AND id = $2 AND status = 'notified'
             RETURNING *",
        )
        .bind(tenant)
        .bind(entry_id)
        .fetch_optional(&mut *tx)
        .await?;

        let entry = match entry {
            Some(entry) => entry,
            None => {
                tx.rollback().await?;
                return Err(CoreError::invariant(
                    "held slot references an entry that is not notified",
                ));
            }
        };

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await?;

        Ok((slot, entry))
    }

    async fn cancel_slot(
        &self,
        tenant: TenantId,
        slot_id: SlotId,
        audit: AuditRecord,
    ) -> CoreResult<Slot> {
        let mut tx = self.pool.begin().await?;

        let current: Option<Slot> =
            sqlx::query_as("SELECT * FROM slots WHERE tenant_id = $1 AND id = $2 FOR UPDATE")
                .bind(tenant)
                .bind(slot_id)
                .fetch_optional(&mut *tx)
                .await?;

        let current = match current {
            Some(slot) => slot,
            None => {
                tx.rollback().await?;
                return Err(CoreError::NotFound("slot"));
            }
        };

        match current.status {
            SlotStatus::Canceled => {
                // Repeated admin cancel is a no-op.
                tx.rollback().await?;
                return Ok(current);
            }
            SlotStatus::Booked => {
                tx.rollback().await?;
                return Err(CoreError::PreconditionFailed(
                    Precondition::SlotNoLongerAvailable,
                ));
            }
            SlotStatus::Open | SlotStatus::Held => {}
        }

        // A held slot's candidate goes back into the pool.
        if let Some(entry_id) = current.held_entry_id {
            sqlx::query(
                "UPDATE waitlist_entries SET status = 'active', updated_at = now()
                 WHERE tenant_id = $1 AND id = $2 AND status = 'notified'",
            )
            .bind(tenant)
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;
        }

        let slot = sqlx::query_as::<_, Slot>(
            "UPDATE slots
             SET status = 'canceled', hold_expires_at = NULL, held_entry_id = NULL,
                 version = version + 1, updated_at = now()
             WHERE tenant_id = $1 AND id = $2
             RETURNING *",
        )
        .bind(tenant)
        .bind(slot_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::append_audit_tx(&mut tx, &audit).await?;
        tx.commit().await?;

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
        sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings
             WHERE tenant_id = $1 AND slot_id = $2 AND status <> 'canceled'",
        )
        .bind(tenant)
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    // ------------------------------------------------------------------
    // System scans
    // ------------------------------------------------------------------

    async fn list_expired_holds(&self, now: DateTime<Utc>, limit: i64) -> CoreResult<Vec<Slot>> {
        sqlx::query_as::<_, Slot>(
            "SELECT * FROM slots
             WHERE status = 'held' AND hold_expires_at <= $1
             ORDER BY hold_expires_at ASC
             LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn calendar_events_needing_repair(
        &self,
        limit: i64,
    ) -> CoreResult<Vec<CalendarRepair>> {
        #[derive(sqlx::FromRow)]
        struct RepairRow {
            id: CalendarEventId,
            tenant_id: TenantId,
            slot_id: SlotId,
            staff_id: StaffId,
            external_event_id: Option<String>,
            status: CalendarEventStatus,
            error: Option<String>,
            created_at: DateTime<Utc>,
            updated_at: DateTime<Utc>,
            slot_status: SlotStatus,
        }

        let rows: Vec<RepairRow> = sqlx::query_as(
            "SELECT ce.id, ce.tenant_id, ce.slot_id, ce.staff_id, ce.external_event_id,
                    ce.status, ce.error, ce.created_at, ce.updated_at,
                    s.status AS slot_status
             FROM calendar_events ce
             JOIN slots s ON s.id = ce.slot_id
             WHERE ce.status = 'error'
                OR (ce.status = 'created' AND s.status = 'canceled')
             ORDER BY ce.updated_at ASC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CalendarRepair {
                event: CalendarEvent {
                    id: r.id,
                    tenant_id: r.tenant_id,
                    slot_id: r.slot_id,
                    staff_id: r.staff_id,
                    external_event_id: r.external_event_id,
                    status: r.status,
                    error: r.error,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                },
                slot_status: r.slot_status,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    async fn insert_notification(
        &self,
        tenant: TenantId,
        notification: NewNotification,
    ) -> CoreResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (id, tenant_id, entry_id, slot_id, channel, status, token_digest)
             VALUES ($1, $2, $3, $4, $5, 'pending', $6)
             RETURNING *",
        )
        .bind(NotificationId::new())
        .bind(tenant)
        .bind(notification.entry_id)
        .bind(notification.slot_id)
        .bind(notification.channel)
        .bind(&notification.token_digest)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn mark_notification_sent(
        &self,
        tenant: TenantId,
        id: NotificationId,
        provider_id: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE notifications SET status = 'sent', provider_id = $3, sent_at = $4, error = NULL
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .bind(provider_id)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_notification_failed(
        &self,
        tenant: TenantId,
        id: NotificationId,
        error: &str,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE notifications SET status = 'failed', error = $3
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_notification_response(
        &self,
        tenant: TenantId,
        entry_id: EntryId,
        slot_id: SlotId,
        response: NotificationResponse,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE notifications SET response = $4
             WHERE id = (
                SELECT id FROM notifications
                WHERE tenant_id = $1 AND entry_id = $2 AND slot_id = $3
                ORDER BY created_at DESC
                LIMIT 1
             )",
        )
        .bind(tenant)
        .bind(entry_id)
        .bind(slot_id)
        .bind(response)
        .execute(&self.pool)
        .await?;

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
        sqlx::query_as::<_, CalendarEvent>(
            "INSERT INTO calendar_events (id, tenant_id, slot_id, staff_id, external_event_id, status, error)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(CalendarEventId::new())
        .bind(tenant)
        .bind(event.slot_id)
        .bind(event.staff_id)
        .bind(&event.external_event_id)
        .bind(event.status)
        .bind(&event.error)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn update_calendar_event(
        &self,
        tenant: TenantId,
        id: CalendarEventId,
        status: CalendarEventStatus,
        external_event_id: Option<&str>,
        error: Option<&str>,
    ) -> CoreResult<()> {
        sqlx::query(
            "UPDATE calendar_events
             SET status = $3,
                 external_event_id = COALESCE($4, external_event_id),
                 error = $5,
                 updated_at = now()
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .bind(status)
        .bind(external_event_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    async fn append_audit(&self, record: AuditRecord) -> CoreResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::append_audit_tx(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_audit(&self, tenant: TenantId, limit: i64) -> CoreResult<Vec<AuditLogRow>> {
        sqlx::query_as::<_, AuditLogRow>(
            "SELECT * FROM audit_logs WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(tenant)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }
}
