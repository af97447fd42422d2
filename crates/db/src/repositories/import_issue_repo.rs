//! Repository for the `import_issues` table.

use accessmig_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::import_issue::{CreateImportIssue, ImportIssue};

/// Column list for import_issues queries.
const COLUMNS: &str = "id, import_log_id, database_id, object_name, object_type, severity, \
    category, message, suggestion, resolved, created_at, updated_at";

pub struct ImportIssueRepo;

impl ImportIssueRepo {
    pub async fn create(pool: &PgPool, input: &CreateImportIssue) -> Result<ImportIssue, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_issues
                (import_log_id, database_id, object_name, object_type,
                 severity, category, message, suggestion)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ImportIssue>(&query)
            .bind(input.import_log_id)
            .bind(input.database_id)
            .bind(&input.object_name)
            .bind(input.object_type.as_str())
            .bind(input.severity.as_str())
            .bind(&input.category)
            .bind(&input.message)
            .bind(&input.suggestion)
            .fetch_one(pool)
            .await
    }

    /// Insert several issues in one transaction.
    pub async fn create_many(
        pool: &PgPool,
        inputs: &[CreateImportIssue],
    ) -> Result<Vec<ImportIssue>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let created = Self::insert_all(&mut *tx, inputs).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Insert several issues on a connection the caller manages, typically
    /// inside the transaction that wrote their import log.
    pub async fn insert_all(
        conn: &mut PgConnection,
        inputs: &[CreateImportIssue],
    ) -> Result<Vec<ImportIssue>, sqlx::Error> {
        let query = format!(
            "INSERT INTO import_issues
                (import_log_id, database_id, object_name, object_type,
                 severity, category, message, suggestion)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        );
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let issue = sqlx::query_as::<_, ImportIssue>(&query)
                .bind(input.import_log_id)
                .bind(input.database_id)
                .bind(&input.object_name)
                .bind(input.object_type.as_str())
                .bind(input.severity.as_str())
                .bind(&input.category)
                .bind(&input.message)
                .bind(&input.suggestion)
                .fetch_one(&mut *conn)
                .await?;
            created.push(issue);
        }
        Ok(created)
    }

    /// Issues for one import attempt, in creation order.
    pub async fn list_by_log(
        pool: &PgPool,
        import_log_id: DbId,
    ) -> Result<Vec<ImportIssue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_issues
             WHERE import_log_id = $1
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, ImportIssue>(&query)
            .bind(import_log_id)
            .fetch_all(pool)
            .await
    }

    /// Issues for one target database, newest first.
    pub async fn list_by_database(
        pool: &PgPool,
        database_id: DbId,
        unresolved_only: bool,
    ) -> Result<Vec<ImportIssue>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM import_issues
             WHERE database_id = $1 AND (NOT $2 OR resolved = false)
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ImportIssue>(&query)
            .bind(database_id)
            .bind(unresolved_only)
            .fetch_all(pool)
            .await
    }
}
