pub mod calendar_event;

pub use calendar_event::{CalendarEvent, CalendarEventStatus, CalendarRepair, NewCalendarEvent};
