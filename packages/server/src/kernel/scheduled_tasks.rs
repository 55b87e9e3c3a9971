//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Two periodic workers keep the engine honest:
//! - The hold ticker releases lapsed holds and cascades each freed slot.
//! - The calendar reconciler repairs failed mirror writes and collects
//!   orphaned events.
//!
//! Multiple deployment instances can run these safely: every transition the
//! workers drive is CAS-guarded in the store, so duplicated work degrades
//! into no-ops. Non-fatal errors are logged and the next tick tries again;
//! an invariant violation halts the worker for operator attention.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::calendar::adapter::reconcile_calendar;
use crate::domains::scheduling::actions::process_expired_holds;
use crate::kernel::deps::EngineDeps;

/// Page size for one expired-holds pass.
const EXPIRED_HOLDS_PAGE: i64 = 100;
/// Page size for one reconciler pass.
const CALENDAR_REPAIR_PAGE: i64 = 50;
/// Reconciler cadence; calendar drift is not urgent.
const RECONCILE_INTERVAL_SECS: u64 = 300;

/// Start all scheduled tasks
pub async fn start_scheduler(deps: EngineDeps) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Hold ticker
    let tick_deps = deps.clone();
    let halted = Arc::new(AtomicBool::new(false));
    let tick_halted = halted.clone();
    let tick_job = Job::new_repeated_async(
        Duration::from_secs(deps.settings.ticker_interval_seconds),
        move |_uuid, _lock| {
            let deps = tick_deps.clone();
            let halted = tick_halted.clone();
            Box::pin(async move {
                if halted.load(Ordering::SeqCst) {
                    return;
                }
                match process_expired_holds(&deps, EXPIRED_HOLDS_PAGE).await {
                    Ok(_report) => {}
                    Err(e) if e.is_fatal() => {
                        tracing::error!("hold ticker halted: {}", e);
                        halted.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tracing::warn!("hold ticker pass failed: {}", e);
                    }
                }
            })
        },
    )?;
    scheduler.add(tick_job).await?;

    // Calendar reconciler
    let reconcile_deps = deps.clone();
    let reconcile_halted = halted.clone();
    let reconcile_job = Job::new_repeated_async(
        Duration::from_secs(RECONCILE_INTERVAL_SECS),
        move |_uuid, _lock| {
            let deps = reconcile_deps.clone();
            let halted = reconcile_halted.clone();
            Box::pin(async move {
                if halted.load(Ordering::SeqCst) {
                    return;
                }
                match reconcile_calendar(&deps, CALENDAR_REPAIR_PAGE).await {
                    Ok(_report) => {}
                    Err(e) if e.is_fatal() => {
                        tracing::error!("calendar reconciler halted: {}", e);
                        halted.store(true, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tracing::warn!("calendar reconcile pass failed: {}", e);
                    }
                }
            })
        },
    )?;
    scheduler.add(reconcile_job).await?;

    scheduler.start().await?;

    tracing::info!(
        ticker_interval_seconds = deps.settings.ticker_interval_seconds,
        reconcile_interval_seconds = RECONCILE_INTERVAL_SECS,
        "scheduled tasks started (hold ticker, calendar reconciler)"
    );
    Ok(scheduler)
}
