// Waitlist domain: entries, the pure priority engine, and the read-only
// candidate selector.

pub mod actions;
pub mod models;
pub mod priority;
pub mod selector;

pub use models::{EntryStatus, NewEntry, WaitlistEntry};
pub use priority::RankedCandidate;
pub use selector::select_candidates;
