use serde_json::json;

use crate::common::{CoreError, CoreResult, Precondition};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::calendar::adapter::enqueue_calendar_create;
use crate::domains::confirmation::tokens::TokenAction;
use crate::domains::notifications::models::NotificationResponse;
use crate::domains::scheduling::models::{Booking, Slot};
use crate::kernel::deps::EngineDeps;

/// What the customer gets back from a successful (or replayed) confirm.
#[derive(Debug, Clone)]
pub struct ConfirmReceipt {
    pub booking: Booking,
    pub slot: Slot,
}

/// Finalize a booking from a confirm token.
///
/// The critical section is exactly the store transaction: token
/// verification happens before it, calendar work after it. Replaying a
/// token that already confirmed returns the original booking so repeated
/// clicks are harmless; a token whose hold lapsed or whose slot went to
/// someone else surfaces the precise precondition failure.
pub async fn confirm(deps: &EngineDeps, token: &str) -> CoreResult<ConfirmReceipt> {
    let now = deps.clock.now();
    let claims = deps.tokens.verify(token, TokenAction::Confirm, now)?;
    let tenant = claims.tenant_id;

    let audit = AuditRecord::new(
        tenant,
        Actor::customer(Some(claims.entry_id.into_uuid())),
        "booking.confirm",
        "slot",
        Some(claims.slot_id.into_uuid()),
    )
    .with_metadata(json!({ "entry_id": claims.entry_id, "token_jti": claims.jti }));

    let outcome = match deps
        .store
        .confirm_slot(tenant, claims.slot_id, claims.entry_id, now, audit)
        .await
    {
        Ok(outcome) => outcome,
        Err(CoreError::PreconditionFailed(Precondition::SlotNoLongerAvailable)) => {
            // Replay: if this very entry already owns the booking, hand the
            // receipt back instead of a conflict.
            if let Some(booking) = deps.store.booking_for_slot(tenant, claims.slot_id).await? {
                if booking.waitlist_entry_id == Some(claims.entry_id) {
                    let slot = deps
                        .store
                        .get_slot(tenant, claims.slot_id)
                        .await?
                        .ok_or(CoreError::NotFound("slot"))?;
                    tracing::debug!(
                        slot_id = %slot.id,
                        entry_id = %claims.entry_id,
                        "confirm token replayed; returning prior booking"
                    );
                    return Ok(ConfirmReceipt { booking, slot });
                }
            }
            return Err(CoreError::PreconditionFailed(
                Precondition::SlotNoLongerAvailable,
            ));
        }
        Err(e) => return Err(e),
    };

    if !outcome.removed_entry_ids.is_empty() {
        tracing::info!(
            entry_id = %outcome.entry.id,
            removed = outcome.removed_entry_ids.len(),
            "same-phone entries removed after confirm"
        );
    }

    // Bookkeeping and side-effects after commit; neither can undo the
    // booking.
    if let Err(e) = deps
        .store
        .record_notification_response(
            tenant,
            claims.entry_id,
            claims.slot_id,
            NotificationResponse::Confirmed,
        )
        .await
    {
        tracing::warn!(error = %e, "failed to record confirm on notification row");
    }

    enqueue_calendar_create(deps, &outcome.slot, &outcome.booking).await;

    tracing::info!(
        booking_id = %outcome.booking.id,
        slot_id = %outcome.slot.id,
        entry_id = %outcome.entry.id,
        "booking confirmed"
    );

    Ok(ConfirmReceipt {
        booking: outcome.booking,
        slot: outcome.slot,
    })
}
