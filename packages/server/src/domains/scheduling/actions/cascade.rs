//! Cascade protocol: after a slot transitions `held → open`, offer it to
//! the next candidate.
//!
//! One step only - a cascade never recurses. Further declines and expiries
//! arrive as independent events and run their own step. Candidates that went
//! stale between selection and the atomic hold are skipped, bounded by the
//! configured fan-out so a thrashing waitlist can't pin a worker.

use chrono::Duration;

use crate::common::{CoreError, CoreResult, EntryId, Precondition};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::notifications::dispatcher::dispatch_hold_offer;
use crate::domains::scheduling::models::Slot;
use crate::domains::waitlist::models::WaitlistEntry;
use crate::domains::waitlist::priority::RankedCandidate;
use crate::domains::waitlist::selector::select_candidates;
use crate::kernel::deps::EngineDeps;

/// What one cascade step did.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    /// The slot as the step left it: held for `next_candidate`, or open.
    pub slot: Slot,
    pub next_candidate: Option<WaitlistEntry>,
    pub notification_enqueued: bool,
}

/// Run one cascade step on a slot that just came open.
///
/// `exclude` is the entry that just declined or lost the hold: still active
/// and often still the top-ranked candidate, but offering them the same
/// slot right back would loop. They compete again the next time this slot
/// (or any other) opens.
pub async fn run_cascade(
    deps: &EngineDeps,
    slot: &Slot,
    actor: Actor,
    ttl_minutes: i64,
    exclude: Option<EntryId>,
) -> CoreResult<CascadeOutcome> {
    let mut candidates = select_candidates(deps, slot).await?;
    if let Some(excluded) = exclude {
        candidates.retain(|c| c.entry.id != excluded);
    }
    hold_first_available(deps, slot, candidates, actor, ttl_minutes).await
}

/// Try candidates in rank order until one hold sticks, bounded by the
/// cascade fan-out. Shared by `open_slot` (which already ran selection) and
/// `run_cascade`.
pub async fn hold_first_available(
    deps: &EngineDeps,
    slot: &Slot,
    candidates: Vec<RankedCandidate>,
    actor: Actor,
    ttl_minutes: i64,
) -> CoreResult<CascadeOutcome> {
    let tenant = slot.tenant_id;
    let expires_at = deps.clock.now() + Duration::minutes(ttl_minutes);

    for candidate in candidates
        .into_iter()
        .take(deps.settings.cascade_fanout_k)
    {
        let entry_id = candidate.entry.id;
        let audit = AuditRecord::new(
            tenant,
            actor,
            "slot.hold",
            "slot",
            Some(slot.id.into_uuid()),
        )
        .with_metadata(serde_json::json!({
            "entry_id": entry_id,
            "match_score": candidate.match_score,
            "hold_expires_at": expires_at,
        }));

        match deps
            .store
            .hold_slot(tenant, slot.id, entry_id, expires_at, audit)
            .await
        {
            Ok((held_slot, entry)) => {
                let delivered = match dispatch_hold_offer(deps, &held_slot, &entry).await {
                    Ok(outcome) => outcome.delivered,
                    Err(e) => {
                        // The hold stands either way; an undelivered offer
                        // expires and cascades on the next ticker pass.
                        tracing::warn!(
                            slot_id = %held_slot.id,
                            entry_id = %entry.id,
                            error = %e,
                            "offer dispatch failed after hold"
                        );
                        false
                    }
                };

                return Ok(CascadeOutcome {
                    slot: held_slot,
                    next_candidate: Some(entry),
                    notification_enqueued: delivered,
                });
            }
            Err(CoreError::PreconditionFailed(Precondition::EntryNotActive)) => {
                tracing::debug!(
                    slot_id = %slot.id,
                    entry_id = %entry_id,
                    "candidate went stale before hold; trying next"
                );
                continue;
            }
            Err(CoreError::PreconditionFailed(Precondition::SlotNoLongerAvailable)) => {
                // A concurrent actor claimed the slot mid-step; report what
                // the slot looks like now.
                let current = deps
                    .store
                    .get_slot(tenant, slot.id)
                    .await?
                    .ok_or(CoreError::NotFound("slot"))?;
                return Ok(CascadeOutcome {
                    slot: current,
                    next_candidate: None,
                    notification_enqueued: false,
                });
            }
            Err(e) => return Err(e),
        }
    }

    // Nobody matched (or everyone in the fan went stale): the slot stays
    // open.
    let current = deps
        .store
        .get_slot(tenant, slot.id)
        .await?
        .ok_or(CoreError::NotFound("slot"))?;
    Ok(CascadeOutcome {
        slot: current,
        next_candidate: None,
        notification_enqueued: false,
    })
}
