pub mod audit_log;

pub use audit_log::{Actor, ActorType, AuditLogRow, AuditRecord};
