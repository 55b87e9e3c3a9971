//! Best-effort calendar mirror.
//!
//! Adapter calls run strictly after the owning transaction commits and
//! never feed errors back into the engine: a failed create/delete marks the
//! event row `error`, flags the staff member's sync status, and waits for
//! the reconciler.

use crate::common::CoreResult;
use crate::domains::calendar::models::{CalendarEventStatus, NewCalendarEvent};
use crate::domains::scheduling::models::{Booking, Slot, SlotStatus};
use crate::kernel::deps::EngineDeps;
use crate::kernel::traits::CalendarEventPayload;

/// Mirror a fresh booking onto the staff calendar. Never fails the caller.
pub async fn enqueue_calendar_create(deps: &EngineDeps, slot: &Slot, booking: &Booking) {
    if !deps.settings.calendar_enabled {
        return;
    }

    let tenant = slot.tenant_id;

    let service_name = match deps.store.get_service(tenant, slot.service_id).await {
        Ok(Some(service)) => service.name,
        Ok(None) => "Appointment".to_string(),
        Err(e) => {
            tracing::warn!(slot_id = %slot.id, error = %e, "calendar create skipped");
            return;
        }
    };

    let payload = CalendarEventPayload {
        tenant_id: tenant,
        slot_id: slot.id,
        staff_id: slot.staff_id,
        summary: format!("{} – {}", service_name, booking.customer_name),
        start_time: slot.start_time,
        end_time: slot.end_time,
    };

    let (status, external_id, error) = match deps.calendar.create(&payload).await {
        Ok(external_id) => (CalendarEventStatus::Created, Some(external_id), None),
        Err(e) => {
            tracing::warn!(slot_id = %slot.id, error = %e, "calendar create failed");
            (CalendarEventStatus::Error, None, Some(e.to_string()))
        }
    };

    let row = deps
        .store
        .insert_calendar_event(
            tenant,
            NewCalendarEvent {
                slot_id: slot.id,
                staff_id: slot.staff_id,
                external_event_id: external_id,
                status,
                error: error.clone(),
            },
        )
        .await;
    if let Err(e) = row {
        tracing::warn!(slot_id = %slot.id, error = %e, "calendar event row insert failed");
        return;
    }

    let sync = match &error {
        None => deps
            .store
            .set_staff_calendar_sync(tenant, slot.staff_id, "ok", None)
            .await,
        Some(message) => {
            deps.store
                .set_staff_calendar_sync(tenant, slot.staff_id, "error", Some(message))
                .await
        }
    };
    if let Err(e) = sync {
        tracing::warn!(staff_id = %slot.staff_id, error = %e, "staff sync status update failed");
    }
}

/// Counters for one reconciler pass.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ReconcileReport {
    pub recreated: u64,
    pub deleted: u64,
    pub failed: u64,
}

/// Repair calendar rows the adapter left behind: retry failed creates for
/// still-booked slots, delete events whose slot is gone, and drop stale
/// error rows.
pub async fn reconcile_calendar(deps: &EngineDeps, limit: i64) -> CoreResult<ReconcileReport> {
    if !deps.settings.calendar_enabled {
        return Ok(ReconcileReport::default());
    }

    let repairs = deps.store.calendar_events_needing_repair(limit).await?;
    let mut report = ReconcileReport::default();

    for repair in repairs {
        let event = repair.event;
        let tenant = event.tenant_id;

        match repair.slot_status {
            SlotStatus::Canceled => {
                // External side first, then the row; a delete failure leaves
                // the row for the next pass.
                if let Some(external_id) = &event.external_event_id {
                    if let Err(e) = deps.calendar.delete(external_id).await {
                        tracing::warn!(event_id = %event.id, error = %e, "calendar delete failed");
                        report.failed += 1;
                        deps.store
                            .update_calendar_event(
                                tenant,
                                event.id,
                                CalendarEventStatus::Error,
                                None,
                                Some(&e.to_string()),
                            )
                            .await?;
                        continue;
                    }
                }
                deps.store
                    .update_calendar_event(tenant, event.id, CalendarEventStatus::Deleted, None, None)
                    .await?;
                report.deleted += 1;
            }
            SlotStatus::Booked => {
                // Retry the create that failed earlier.
                let Some(slot) = deps.store.get_slot(tenant, event.slot_id).await? else {
                    continue;
                };
                let Some(booking) = deps.store.booking_for_slot(tenant, event.slot_id).await?
                else {
                    continue;
                };

                let service_name = deps
                    .store
                    .get_service(tenant, slot.service_id)
                    .await?
                    .map(|s| s.name)
                    .unwrap_or_else(|| "Appointment".to_string());

                let payload = CalendarEventPayload {
                    tenant_id: tenant,
                    slot_id: slot.id,
                    staff_id: slot.staff_id,
                    summary: format!("{} – {}", service_name, booking.customer_name),
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                };

                match deps.calendar.create(&payload).await {
                    Ok(external_id) => {
                        deps.store
                            .update_calendar_event(
                                tenant,
                                event.id,
                                CalendarEventStatus::Created,
                                Some(&external_id),
                                None,
                            )
                            .await?;
                        deps.store
                            .set_staff_calendar_sync(tenant, slot.staff_id, "ok", None)
                            .await?;
                        report.recreated += 1;
                    }
                    Err(e) => {
                        tracing::warn!(event_id = %event.id, error = %e, "calendar re-create failed");
                        report.failed += 1;
                        deps.store
                            .update_calendar_event(
                                tenant,
                                event.id,
                                CalendarEventStatus::Error,
                                None,
                                Some(&e.to_string()),
                            )
                            .await?;
                    }
                }
            }
            SlotStatus::Open | SlotStatus::Held => {
                // The booking this event mirrored is gone; the row is stale.
                deps.store
                    .update_calendar_event(tenant, event.id, CalendarEventStatus::Deleted, None, None)
                    .await?;
                report.deleted += 1;
            }
        }
    }

    if report.recreated + report.deleted + report.failed > 0 {
        tracing::info!(
            recreated = report.recreated,
            deleted = report.deleted,
            failed = report.failed,
            "calendar reconcile pass complete"
        );
    }

    Ok(report)
}
