use anyhow::Result;
use async_trait::async_trait;

use crate::domain::AuditEntry;
use crate::storage::Repository;

/// Destination for audit entries.
///
/// Appends happen after the audited change is committed, so a failing sink
/// can never undo ledger state. Callers log the error and move on.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        details: &str,
    ) -> Result<AuditEntry>;
}

#[async_trait]
impl AuditSink for Repository {
    async fn append(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        details: &str,
    ) -> Result<AuditEntry> {
        let mut entry = AuditEntry::new(entity_type, entity_id, action, details);
        self.insert_audit_entry(&mut entry).await?;
        Ok(entry)
    }
}
