//! Repository for the append-only `import_logs` table.

use accessmig_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use super::{clamp_limit, clamp_offset};
use crate::models::import_log::{CreateImportLog, ImportLog};

/// Column list for import_logs queries, aliased `l` and joined to its status `s`.
const COLUMNS: &str = "l.id, l.source_path, l.source_object_name, l.source_object_type, \
    l.target_database_id, l.status_id, s.name AS status, l.error_message, l.details, l.created_at";

/// Inserts and reads import attempts. Rows are never updated.
pub struct ImportLogRepo;

impl ImportLogRepo {
    /// Record an attempt, resolving its status through the lookup table.
    pub async fn create<'e, E>(executor: E, input: &CreateImportLog) -> Result<ImportLog, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let details = input
            .details
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let query = format!(
            "WITH l AS (
                INSERT INTO import_logs
                    (source_path, source_object_name, source_object_type,
                     target_database_id, status_id, error_message, details)
                SELECT $1, $2, $3, $4, st.id, $6, $7
                FROM import_log_statuses st WHERE st.name = $5
                RETURNING *
             )
             SELECT {COLUMNS} FROM l JOIN import_log_statuses s ON s.id = l.status_id"
        );
        sqlx::query_as::<_, ImportLog>(&query)
            .bind(&input.source_path)
            .bind(&input.source_object_name)
            .bind(input.source_object_type.as_str())
            .bind(input.target_database_id)
            .bind(input.status.as_str())
            .bind(&input.error_message)
            .bind(&details)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ImportLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_logs l
             JOIN import_log_statuses s ON s.id = l.status_id
             WHERE l.id = $1"
        );
        sqlx::query_as::<_, ImportLog>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Attempts for one legacy source file, newest first.
    pub async fn list_by_source_path(
        pool: &PgPool,
        source_path: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_logs l
             JOIN import_log_statuses s ON s.id = l.status_id
             WHERE l.source_path = $1
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ImportLog>(&query)
            .bind(source_path)
            .bind(clamp_limit(limit))
            .bind(clamp_offset(offset))
            .fetch_all(pool)
            .await
    }

    /// Attempts against one target database, newest first.
    pub async fn list_by_database(
        pool: &PgPool,
        target_database_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<ImportLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_logs l
             JOIN import_log_statuses s ON s.id = l.status_id
             WHERE l.target_database_id = $1
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ImportLog>(&query)
            .bind(target_database_id)
            .bind(clamp_limit(limit))
            .bind(clamp_offset(offset))
            .fetch_all(pool)
            .await
    }
}
