// Kernel - core infrastructure with dependency injection
//
// EngineDeps holds every injected dependency (store, clock, token codec,
// sender, calendar sink, audit sink) behind traits for testability.
//
// IMPORTANT: Kernel is for INFRASTRUCTURE only, not business logic.
// Business logic belongs in domain layers.

pub mod clock;
pub mod deps;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use clock::SystemClock;
pub use deps::{EngineDeps, LogSender, NoopCalendarSink, TwilioSender, WebhookCalendarSink};
pub use test_dependencies::{
    ManualClock, RecordingCalendarSink, RecordingSender, TestDependencies,
};
pub use traits::*;
