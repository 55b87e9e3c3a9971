pub mod booking;
pub mod slot;

pub use booking::{Booking, BookingSource, BookingStatus};
pub use slot::{NewSlot, Slot, SlotStatus};
