use crate::common::{CoreResult, TenantId};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::waitlist::models::{NewEntry, WaitlistEntry};
use crate::domains::waitlist::priority::initial_score;
use crate::kernel::deps::EngineDeps;

/// Add a customer to the waitlist.
///
/// The per-phone cap on simultaneously open entries is enforced inside the
/// store insert, so two concurrent joins can't both slip under it.
pub async fn join_waitlist(
    deps: &EngineDeps,
    tenant: TenantId,
    input: NewEntry,
) -> CoreResult<WaitlistEntry> {
    let score = initial_score(input.vip, input.staff_id.is_some());

    let entry = deps
        .store
        .insert_entry(
            tenant,
            input,
            score,
            deps.settings.max_active_entries_per_phone,
        )
        .await?;

    deps.audit
        .append(
            AuditRecord::new(
                tenant,
                Actor::customer(Some(entry.id.into_uuid())),
                "waitlist.join",
                "waitlist_entry",
                Some(entry.id.into_uuid()),
            )
            .with_metadata(serde_json::json!({
                "service_id": entry.service_id,
                "vip": entry.vip,
            })),
        )
        .await?;

    tracing::info!(entry_id = %entry.id, tenant_id = %tenant, "waitlist entry created");

    Ok(entry)
}
