use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::{AuditLogId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_actor_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    System,
    Staff,
    Customer,
}

/// Who performed an action. Background workers act as `System` with no id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub actor_type: ActorType,
    pub actor_id: Option<Uuid>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            actor_type: ActorType::System,
            actor_id: None,
        }
    }

    pub fn staff(id: Uuid) -> Self {
        Self {
            actor_type: ActorType::Staff,
            actor_id: Some(id),
        }
    }

    pub fn customer(id: Option<Uuid>) -> Self {
        Self {
            actor_type: ActorType::Customer,
            actor_id: id,
        }
    }
}

/// Append-only record of a state change. Transition transactions write their
/// record in the same transaction as the change itself.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub tenant_id: TenantId,
    pub actor: Actor,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub metadata: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        tenant_id: TenantId,
        actor: Actor,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: Option<Uuid>,
    ) -> Self {
        Self {
            tenant_id,
            actor,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A persisted audit row.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct AuditLogRow {
    pub id: AuditLogId,
    pub tenant_id: TenantId,
    pub actor_type: ActorType,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
