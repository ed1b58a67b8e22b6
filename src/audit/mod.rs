pub mod audit_flag;
pub mod audit_log;
pub mod audit_record;

pub use audit_flag::AuditFlag;
pub use audit_log::{AuditLog, AuditSummary};
pub use audit_record::AuditRecord;
