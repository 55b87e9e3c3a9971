use std::sync::Arc;

use async_trait::async_trait;

use crate::common::CoreResult;
use crate::domains::audit::models::AuditRecord;
use crate::kernel::traits::BaseAuditSink;
use crate::store::Store;

/// Audit sink that appends through the store, for records produced outside
/// a transition transaction (worker summaries, adapter failures).
pub struct StoreAuditSink {
    store: Arc<dyn Store>,
}

impl StoreAuditSink {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BaseAuditSink for StoreAuditSink {
    async fn append(&self, record: AuditRecord) -> CoreResult<()> {
        self.store.append_audit(record).await
    }
}
