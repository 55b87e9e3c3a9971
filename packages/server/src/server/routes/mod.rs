pub mod health;
pub mod respond;
pub mod slots;
pub mod waitlist;

pub use health::health_handler;
pub use respond::{respond_confirm_handler, respond_decline_handler};
pub use slots::{
    cancel_slot_handler, create_slot_handler, hold_slot_handler, open_slot_handler,
    process_expired_holds_handler,
};
pub use waitlist::{join_waitlist_handler, remove_entry_handler};
