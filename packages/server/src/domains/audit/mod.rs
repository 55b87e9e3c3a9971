// Append-only audit trail of every state change.

pub mod models;
pub mod sink;

pub use models::{Actor, ActorType, AuditLogRow, AuditRecord};
pub use sink::StoreAuditSink;
