// Confirmation domain: signed respond tokens and the handler that turns
// them into state machine transitions.

pub mod actions;
pub mod tokens;

pub use actions::{confirm, decline, ConfirmReceipt, DeclineReceipt};
pub use tokens::{RespondClaims, TokenAction, TokenCodec, TokenPair};
