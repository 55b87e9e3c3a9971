pub mod entry;

pub use entry::{EntryStatus, NewEntry, WaitlistEntry};
