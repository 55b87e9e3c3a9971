use std::fmt;

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

/// Which CAS guard was missed. Carried inside `CoreError::PreconditionFailed`
/// so callers can tell "someone else got the slot" from "your hold ran out"
/// from "this entry already moved on".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    SlotNoLongerAvailable,
    HoldExpired,
    EntryNotActive,
}

impl Precondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precondition::SlotNoLongerAvailable => "slot_no_longer_available",
            Precondition::HoldExpired => "hold_expired",
            Precondition::EntryNotActive => "entry_not_active",
        }
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable error kinds surfaced to consumers of the engine.
///
/// Transitions never retry a missed guard internally: the business meaning
/// of "someone else got it" must reach the caller. Notification and calendar
/// failures are recorded on their rows and never map to one of these kinds.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(Precondition),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited")]
    RateLimited,

    #[error("transient failure: {0}")]
    Transient(String),

    /// Programmer bug. Background workers halt on this kind; everything else
    /// is logged and skipped.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl CoreError {
    /// Machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::InvalidToken(_) => "invalid_token",
            CoreError::PreconditionFailed(_) => "precondition_failed",
            CoreError::Conflict(_) => "conflict",
            CoreError::RateLimited => "rate_limited",
            CoreError::Transient(_) => "transient",
            CoreError::InvariantViolated(_) => "invariant_violated",
        }
    }

    /// Fatal errors halt background workers for operator attention.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::InvariantViolated(_))
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        CoreError::InvariantViolated(msg.into())
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => CoreError::NotFound("row"),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::Conflict(db.message().to_string())
            }
            _ => CoreError::Transient(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(CoreError::NotFound("slot").kind(), "not_found");
        assert_eq!(
            CoreError::PreconditionFailed(Precondition::HoldExpired).kind(),
            "precondition_failed"
        );
        assert_eq!(CoreError::RateLimited.kind(), "rate_limited");
    }

    #[test]
    fn test_precondition_display() {
        assert_eq!(
            Precondition::SlotNoLongerAvailable.to_string(),
            "slot_no_longer_available"
        );
        assert_eq!(Precondition::HoldExpired.to_string(), "hold_expired");
        assert_eq!(Precondition::EntryNotActive.to_string(), "entry_not_active");
    }

    #[test]
    fn test_only_invariant_violations_are_fatal() {
        assert!(CoreError::invariant("two holds on one slot").is_fatal());
        assert!(!CoreError::Transient("connection reset".into()).is_fatal());
        assert!(!CoreError::PreconditionFailed(Precondition::EntryNotActive).is_fatal());
    }
}
