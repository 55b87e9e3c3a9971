pub mod confirm;
pub mod decline;

pub use confirm::{confirm, ConfirmReceipt};
pub use decline::{decline, DeclineReceipt};
