use crate::common::{CoreResult, EntryId, TenantId};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::waitlist::models::WaitlistEntry;
use crate::kernel::deps::EngineDeps;

/// Soft-remove an active entry at the customer's request.
///
/// Entries currently holding a slot (notified) are refused; the customer
/// should decline the offer instead, which releases the slot properly.
pub async fn remove_entry(
    deps: &EngineDeps,
    tenant: TenantId,
    entry_id: EntryId,
    actor: Actor,
) -> CoreResult<WaitlistEntry> {
    let audit = AuditRecord::new(
        tenant,
        actor,
        "waitlist.remove",
        "waitlist_entry",
        Some(entry_id.into_uuid()),
    );

    let entry = deps.store.remove_entry(tenant, entry_id, audit).await?;

    tracing::info!(entry_id = %entry.id, tenant_id = %tenant, "waitlist entry removed");

    Ok(entry)
}
