// Scheduling domain: slots, bookings, the slot state machine, and the
// cascade protocol.

pub mod actions;
pub mod models;

pub use actions::{
    cancel_slot, create_slot, hold_slot, open_slot, process_expired_holds, run_cascade,
    CascadeOutcome, OpenSlotOutcome, TickReport,
};
pub use models::{Booking, BookingSource, BookingStatus, NewSlot, Slot, SlotStatus};
