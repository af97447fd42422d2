//! Repository for the `target_databases` table.

use accessmig_core::types::DbId;
use sqlx::PgPool;

use crate::models::target_database::{CreateTargetDatabase, TargetDatabase};

/// Column list for target_databases queries.
const COLUMNS: &str = "id, name, schema_name, source_path, created_at, updated_at";

pub struct TargetDatabaseRepo;

impl TargetDatabaseRepo {
    /// Register a target database, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTargetDatabase,
    ) -> Result<TargetDatabase, sqlx::Error> {
        let query = format!(
            "INSERT INTO target_databases (name, schema_name, source_path)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TargetDatabase>(&query)
            .bind(&input.name)
            .bind(&input.schema_name)
            .bind(&input.source_path)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TargetDatabase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM target_databases WHERE id = $1");
        sqlx::query_as::<_, TargetDatabase>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_schema_name(
        pool: &PgPool,
        schema_name: &str,
    ) -> Result<Option<TargetDatabase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM target_databases WHERE schema_name = $1");
        sqlx::query_as::<_, TargetDatabase>(&query)
            .bind(schema_name)
            .fetch_optional(pool)
            .await
    }

    /// List all target databases, newest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<TargetDatabase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM target_databases ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, TargetDatabase>(&query)
            .fetch_all(pool)
            .await
    }
}
