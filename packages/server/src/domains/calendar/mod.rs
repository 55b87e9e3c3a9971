// Calendar domain: the external mirror rows, the best-effort adapter, and
// the reconciler.

pub mod adapter;
pub mod models;

pub use adapter::{enqueue_calendar_create, reconcile_calendar, ReconcileReport};
pub use models::{CalendarEvent, CalendarEventStatus, CalendarRepair, NewCalendarEvent};
