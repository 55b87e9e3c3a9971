// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (like "cascade to the next candidate") lives in domain
// functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseClock, BaseAuditSink)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{CoreResult, SlotId, StaffId, TenantId};
use crate::domains::audit::models::AuditRecord;
use crate::domains::notifications::models::NotificationChannel;

// =============================================================================
// Clock Trait (Infrastructure - single point of time injection)
// =============================================================================

/// Wall-clock source. Everything in the engine reads time through this so
/// tests can pin and advance it.
pub trait BaseClock: Send + Sync {
    /// Current time, UTC. Monotonic within a process.
    fn now(&self) -> DateTime<Utc>;
}

// =============================================================================
// Notification Sender Trait (Infrastructure - SMS/email delivery)
// =============================================================================

/// Outcome of a successful hand-off to the delivery provider.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// Provider-side message id, when the provider returns one.
    pub provider_id: Option<String>,
}

#[async_trait]
pub trait BaseNotificationSender: Send + Sync {
    /// Deliver one rendered message. Best-effort: may block, honors the
    /// caller's timeout, and never touches engine state.
    async fn send(
        &self,
        channel: NotificationChannel,
        to: &str,
        rendered: &str,
    ) -> Result<SendOutcome>;
}

// =============================================================================
// Calendar Sink Trait (Infrastructure - external calendar mirror)
// =============================================================================

/// What the external calendar needs to know about a booked slot.
#[derive(Debug, Clone)]
pub struct CalendarEventPayload {
    pub tenant_id: TenantId,
    pub slot_id: SlotId,
    pub staff_id: StaffId,
    /// e.g. "Color Retouch – Maria N."
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[async_trait]
pub trait BaseCalendarSink: Send + Sync {
    /// Create an external event; returns the provider's event id.
    async fn create(&self, event: &CalendarEventPayload) -> Result<String>;

    /// Delete an external event.
    async fn delete(&self, external_event_id: &str) -> Result<()>;
}

// =============================================================================
// Audit Sink Trait (Infrastructure - append-only trail)
// =============================================================================

/// Append-only audit writer for records produced outside a store
/// transaction (worker summaries, adapter failures). Durable before the
/// call returns.
#[async_trait]
pub trait BaseAuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> CoreResult<()>;
}
