//! Target database model.

use accessmig_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `target_databases` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TargetDatabase {
    pub id: DbId,
    pub name: String,
    /// Namespace holding every object imported for this database.
    pub schema_name: String,
    pub source_path: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a target database.
#[derive(Debug, Deserialize)]
pub struct CreateTargetDatabase {
    pub name: String,
    pub schema_name: String,
    pub source_path: Option<String>,
}
