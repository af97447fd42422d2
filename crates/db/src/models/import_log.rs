//! Import audit log model.

use accessmig_core::issues::{ImportStatus, SourceObjectType};
use accessmig_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from `import_logs`, with its status name resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportLog {
    pub id: DbId,
    pub source_path: String,
    pub source_object_name: String,
    pub source_object_type: String,
    pub target_database_id: Option<DbId>,
    pub status_id: i16,
    pub status: String,
    pub error_message: Option<String>,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
}

impl ImportLog {
    pub fn is_success(&self) -> bool {
        self.status == ImportStatus::Success.as_str()
    }
}

/// DTO for recording one import attempt.
#[derive(Debug, Clone)]
pub struct CreateImportLog {
    pub source_path: String,
    pub source_object_name: String,
    pub source_object_type: SourceObjectType,
    pub target_database_id: Option<DbId>,
    pub status: ImportStatus,
    pub error_message: Option<String>,
    pub details: Option<serde_json::Value>,
}
