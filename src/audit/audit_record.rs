use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::audit::audit_flag::AuditFlag;

/// One entry of the append-only audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub message_type: String,
    pub room_id: String,
    /// The decoded message exactly as the client sent it.
    pub data: Value,
    pub flags: Vec<AuditFlag>,
}
