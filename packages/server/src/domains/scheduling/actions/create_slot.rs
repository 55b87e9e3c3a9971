use crate::common::{CoreResult, TenantId};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::scheduling::models::{NewSlot, Slot};
use crate::kernel::deps::EngineDeps;

/// Create a new open slot. Validation (window order, future start, staff
/// overlap) runs inside the store insert.
///
/// Creation does not match by itself: the admin surface calls `open_slot`
/// right after when it wants the waitlist worked immediately.
pub async fn create_slot(
    deps: &EngineDeps,
    tenant: TenantId,
    input: NewSlot,
    actor: Actor,
) -> CoreResult<Slot> {
    let now = deps.clock.now();
    let slot = deps.store.insert_slot(tenant, input, now).await?;

    deps.audit
        .append(
            AuditRecord::new(
                tenant,
                actor,
                "slot.create",
                "slot",
                Some(slot.id.into_uuid()),
            )
            .with_metadata(serde_json::json!({
                "staff_id": slot.staff_id,
                "service_id": slot.service_id,
                "start_time": slot.start_time,
                "end_time": slot.end_time,
            })),
        )
        .await?;

    tracing::info!(slot_id = %slot.id, tenant_id = %tenant, "slot created");

    Ok(slot)
}
