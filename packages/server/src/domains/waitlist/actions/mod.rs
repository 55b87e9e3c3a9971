pub mod join;
pub mod remove;

pub use join::join_waitlist;
pub use remove::remove_entry;
