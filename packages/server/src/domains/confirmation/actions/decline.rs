use serde_json::json;

use crate::common::{CoreError, CoreResult};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::confirmation::tokens::TokenAction;
use crate::domains::notifications::models::NotificationResponse;
use crate::domains::scheduling::actions::cascade::run_cascade;
use crate::domains::waitlist::models::WaitlistEntry;
use crate::kernel::deps::EngineDeps;

#[derive(Debug, Clone)]
pub struct DeclineReceipt {
    /// The candidate the cascade promoted, when there was one.
    pub next_candidate: Option<WaitlistEntry>,
}

/// Pass on a hold from a decline token.
///
/// The decline itself is durable the moment the release commits; the
/// cascade is eventual. A cascade or send failure is logged and the
/// customer still gets a success - their part is done. A decline arriving
/// after the slot already re-entered the cycle is a no-op.
pub async fn decline(deps: &EngineDeps, token: &str) -> CoreResult<DeclineReceipt> {
    let now = deps.clock.now();
    let claims = deps.tokens.verify(token, TokenAction::Decline, now)?;
    let tenant = claims.tenant_id;

    let audit = AuditRecord::new(
        tenant,
        Actor::customer(Some(claims.entry_id.into_uuid())),
        "booking.decline",
        "slot",
        Some(claims.slot_id.into_uuid()),
    )
    .with_metadata(json!({ "entry_id": claims.entry_id, "token_jti": claims.jti }));

    let released = match deps
        .store
        .release_slot(tenant, claims.slot_id, claims.entry_id, audit)
        .await
    {
        Ok(slot) => slot,
        Err(CoreError::PreconditionFailed(_)) => {
            // The hold already moved on (expired, re-held, booked); the
            // decline has nothing left to do.
            tracing::debug!(
                slot_id = %claims.slot_id,
                entry_id = %claims.entry_id,
                "late decline ignored"
            );
            return Ok(DeclineReceipt {
                next_candidate: None,
            });
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = deps
        .store
        .record_notification_response(
            tenant,
            claims.entry_id,
            claims.slot_id,
            NotificationResponse::Declined,
        )
        .await
    {
        tracing::warn!(error = %e, "failed to record decline on notification row");
    }

    tracing::info!(
        slot_id = %released.id,
        entry_id = %claims.entry_id,
        "hold declined"
    );

    match run_cascade(
        deps,
        &released,
        Actor::system(),
        deps.settings.hold_ttl_minutes,
        Some(claims.entry_id),
    )
    .await
    {
        Ok(step) => Ok(DeclineReceipt {
            next_candidate: step.next_candidate,
        }),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::warn!(slot_id = %released.id, error = %e, "cascade after decline failed");
            Ok(DeclineReceipt {
                next_candidate: None,
            })
        }
    }
}
