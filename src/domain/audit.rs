use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ENTITY_TRANSACTION: &str = "transaction";
pub const ENTITY_ACCOUNT: &str = "account";

/// Write-once record of something that happened to an entity.
/// Appended after the change it describes has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: i64,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.into(),
            entity_id,
            action: action.into(),
            details: details.into(),
            created_at: Utc::now(),
        }
    }
}
