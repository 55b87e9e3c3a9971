//! Candidate selection for an open slot.
//!
//! Read-only and side-effect-free: eligibility filtering runs in the store,
//! ranking runs in `priority`. An empty result is a valid answer, distinct
//! from an error - it simply means the slot stays open.

use crate::common::CoreResult;
use crate::domains::scheduling::models::Slot;
use crate::domains::waitlist::priority::{rank, RankedCandidate};
use crate::kernel::deps::EngineDeps;

/// Ranked eligible waitlist entries for `slot`, best first.
pub async fn select_candidates(
    deps: &EngineDeps,
    slot: &Slot,
) -> CoreResult<Vec<RankedCandidate>> {
    let eligible = deps.store.eligible_entries(slot.tenant_id, slot).await?;

    // A dangling staff reference on the slot is worth surfacing, but
    // entries with no staff preference still match it.
    if deps
        .store
        .get_staff(slot.tenant_id, slot.staff_id)
        .await?
        .is_none()
    {
        tracing::warn!(
            slot_id = %slot.id,
            staff_id = %slot.staff_id,
            "slot references missing staff; matching continues"
        );
    }

    Ok(rank(eligible, slot, deps.clock.now()))
}
