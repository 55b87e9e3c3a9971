//! Typed ID definitions for all domain entities.
//!
//! This module defines type aliases for each domain entity, providing
//! compile-time type safety for ID usage throughout the application.
//!
//! # Example
//!
//! ```rust
//! use server_core::common::{TenantId, SlotId, EntryId};
//!
//! // These are incompatible types - compiler prevents mixing them up
//! let tenant_id: TenantId = TenantId::new();
//! let slot_id: SlotId = SlotId::new();
//!
//! // This would be a compile error:
//! // let wrong: SlotId = tenant_id;
//! ```

// Re-export the core Id type and version markers
pub use super::id::{Id, V4, V7};

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Tenant entities (independent businesses sharing the deployment).
pub struct Tenant;

/// Marker type for Staff entities (service providers).
pub struct Staff;

/// Marker type for Service entities (catalog items with duration and price).
pub struct Service;

/// Marker type for Slot entities (concrete appointment windows).
pub struct Slot;

/// Marker type for WaitlistEntry entities (customers waiting for a slot).
pub struct WaitlistEntry;

/// Marker type for Booking entities (finalized appointments).
pub struct Booking;

/// Marker type for Notification entities (outbound hold offers).
pub struct Notification;

/// Marker type for CalendarEvent entities (external calendar mirror rows).
pub struct CalendarEvent;

/// Marker type for AuditLog entities.
pub struct AuditLog;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Tenant entities.
pub type TenantId = Id<Tenant>;

/// Typed ID for Staff entities.
pub type StaffId = Id<Staff>;

/// Typed ID for Service entities.
pub type ServiceId = Id<Service>;

/// Typed ID for Slot entities.
pub type SlotId = Id<Slot>;

/// Typed ID for WaitlistEntry entities.
pub type EntryId = Id<WaitlistEntry>;

/// Typed ID for Booking entities.
pub type BookingId = Id<Booking>;

/// Typed ID for Notification entities.
pub type NotificationId = Id<Notification>;

/// Typed ID for CalendarEvent entities.
pub type CalendarEventId = Id<CalendarEvent>;

/// Typed ID for AuditLog entities.
pub type AuditLogId = Id<AuditLog>;
