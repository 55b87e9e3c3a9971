//! The hold ticker's work: release lapsed holds and cascade each one.
//!
//! Safe to run from several workers at once - every release is CAS-guarded,
//! so a slot that a confirm (or another ticker instance) already moved is
//! simply skipped. Missed ticks cost latency, never correctness: the
//! confirm path re-checks `hold_expires_at` itself, so an overdue hold is
//! rejected even before it gets reaped here.

use serde_json::json;

use crate::common::{CoreError, CoreResult};
use crate::domains::audit::models::{Actor, AuditRecord};
use crate::domains::scheduling::actions::cascade::run_cascade;
use crate::kernel::deps::EngineDeps;

/// Counters for one ticker pass.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TickReport {
    pub released_count: u64,
    pub cascade_notifications: u64,
}

/// Release every hold that lapsed before now (bounded page) and run one
/// cascade step per released slot.
pub async fn process_expired_holds(deps: &EngineDeps, limit: i64) -> CoreResult<TickReport> {
    let now = deps.clock.now();
    let expired = deps.store.list_expired_holds(now, limit).await?;

    let mut report = TickReport::default();

    for slot in expired {
        let tenant = slot.tenant_id;
        let audit = AuditRecord::new(
            tenant,
            Actor::system(),
            "slot.hold_expired",
            "slot",
            Some(slot.id.into_uuid()),
        )
        .with_metadata(json!({ "entry_id": slot.held_entry_id }));

        let (released, lost_entry) = match deps.store.expire_hold(tenant, slot.id, now, audit).await
        {
            Ok((open_slot, entry)) => (open_slot, entry),
            Err(CoreError::PreconditionFailed(_)) => {
                // Confirm or a sibling ticker won the race; nothing to do.
                continue;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(slot_id = %slot.id, error = %e, "expire skipped");
                continue;
            }
        };
        report.released_count += 1;

        match run_cascade(
            deps,
            &released,
            Actor::system(),
            deps.settings.hold_ttl_minutes,
            Some(lost_entry.id),
        )
        .await
        {
            Ok(step) if step.notification_enqueued => report.cascade_notifications += 1,
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(slot_id = %released.id, error = %e, "cascade after expiry failed");
            }
        }
    }

    if report.released_count > 0 {
        tracing::info!(
            released_count = report.released_count,
            cascade_notifications = report.cascade_notifications,
            "expired holds processed"
        );
    }

    Ok(report)
}
