//! Import issue model.

use accessmig_core::issues::{IssueDraft, Severity, SourceObjectType};
use accessmig_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `import_issues` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImportIssue {
    pub id: DbId,
    pub import_log_id: Option<DbId>,
    pub database_id: Option<DbId>,
    pub object_name: String,
    pub object_type: String,
    pub severity: String,
    pub category: String,
    pub message: String,
    pub suggestion: Option<String>,
    pub resolved: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an issue.
#[derive(Debug, Clone)]
pub struct CreateImportIssue {
    pub import_log_id: Option<DbId>,
    pub database_id: Option<DbId>,
    pub object_name: String,
    pub object_type: SourceObjectType,
    pub severity: Severity,
    pub category: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl CreateImportIssue {
    /// Attach an engine-produced draft to a log entry and object.
    pub fn from_draft(
        draft: &IssueDraft,
        import_log_id: Option<DbId>,
        database_id: Option<DbId>,
        object_name: &str,
        object_type: SourceObjectType,
    ) -> Self {
        Self {
            import_log_id,
            database_id,
            object_name: object_name.to_string(),
            object_type,
            severity: draft.severity,
            category: draft.category.to_string(),
            message: draft.message.clone(),
            suggestion: draft.suggestion.clone(),
        }
    }
}
