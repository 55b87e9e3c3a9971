use crate::common::{CoreResult, SlotId, TenantId};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::scheduling::models::Slot;
use crate::kernel::deps::EngineDeps;

/// Cancel an open or held slot. A held slot's candidate returns to the pool
/// in the same transaction. Booked slots are refused; canceling an
/// appointment is a booking-level operation with its own rules.
///
/// Any external calendar event left behind (there should be none for a
/// never-booked slot) is collected by the reconciler.
pub async fn cancel_slot(
    deps: &EngineDeps,
    tenant: TenantId,
    slot_id: SlotId,
    actor: Actor,
) -> CoreResult<Slot> {
    let audit = AuditRecord::new(
        tenant,
        actor,
        "slot.cancel",
        "slot",
        Some(slot_id.into_uuid()),
    );

    let slot = deps.store.cancel_slot(tenant, slot_id, audit).await?;

    tracing::info!(slot_id = %slot.id, tenant_id = %tenant, "slot canceled");

    Ok(slot)
}
