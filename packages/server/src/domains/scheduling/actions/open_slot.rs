//! Admin "open" entry points: run the matching pass on an open slot.

use crate::common::{CoreError, CoreResult, Precondition, SlotId, TenantId};
use crate::domains::audit::models::Actor;
use crate::domains::scheduling::actions::cascade::hold_first_available;
use crate::domains::scheduling::models::{Slot, SlotStatus};
use crate::domains::waitlist::models::WaitlistEntry;
use crate::domains::waitlist::priority::RankedCandidate;
use crate::domains::waitlist::selector::select_candidates;
use crate::kernel::deps::EngineDeps;

#[derive(Debug, Clone)]
pub struct OpenSlotOutcome {
    pub slot: Slot,
    /// The full ranked candidate list at selection time, best first.
    pub candidates: Vec<RankedCandidate>,
    pub top_candidate: Option<WaitlistEntry>,
    pub notification_enqueued: bool,
}

/// Match an open slot against the waitlist: rank candidates, hold for the
/// best one still active, and send the offer. With no candidates the slot
/// simply stays open.
pub async fn open_slot(
    deps: &EngineDeps,
    tenant: TenantId,
    slot_id: SlotId,
    actor: Actor,
) -> CoreResult<OpenSlotOutcome> {
    run_matching(deps, tenant, slot_id, actor, deps.settings.hold_ttl_minutes).await
}

/// Same matching pass with an explicit hold TTL, returning only the slot.
pub async fn hold_slot(
    deps: &EngineDeps,
    tenant: TenantId,
    slot_id: SlotId,
    ttl_minutes: Option<i64>,
    actor: Actor,
) -> CoreResult<Slot> {
    let ttl = ttl_minutes.unwrap_or(deps.settings.hold_ttl_minutes);
    let outcome = run_matching(deps, tenant, slot_id, actor, ttl).await?;
    Ok(outcome.slot)
}

async fn run_matching(
    deps: &EngineDeps,
    tenant: TenantId,
    slot_id: SlotId,
    actor: Actor,
    ttl_minutes: i64,
) -> CoreResult<OpenSlotOutcome> {
    let slot = deps
        .store
        .get_slot(tenant, slot_id)
        .await?
        .ok_or(CoreError::NotFound("slot"))?;

    if slot.status != SlotStatus::Open {
        return Err(CoreError::PreconditionFailed(
            Precondition::SlotNoLongerAvailable,
        ));
    }

    let candidates = select_candidates(deps, &slot).await?;
    if candidates.is_empty() {
        tracing::info!(slot_id = %slot.id, "no eligible candidates; slot stays open");
        return Ok(OpenSlotOutcome {
            slot,
            candidates,
            top_candidate: None,
            notification_enqueued: false,
        });
    }

    let step =
        hold_first_available(deps, &slot, candidates.clone(), actor, ttl_minutes).await?;

    Ok(OpenSlotOutcome {
        slot: step.slot,
        candidates,
        top_candidate: step.next_candidate,
        notification_enqueued: step.notification_enqueued,
    })
}
