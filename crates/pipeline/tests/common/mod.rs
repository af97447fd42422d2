#![allow(dead_code)]

use accessmig_db::models::target_database::CreateTargetDatabase;
use accessmig_db::repositories::TargetDatabaseRepo;
use accessmig_pipeline::{EngineSettings, ImportEngine, TableImportRequest};
use sqlx::PgPool;

pub const SCHEMA: &str = "northwind";
pub const SOURCE: &str = "/data/northwind.accdb";

/// Register the shared target database, returning its id.
pub async fn target_database(pool: &PgPool) -> i64 {
    TargetDatabaseRepo::create(
        pool,
        &CreateTargetDatabase {
            name: "Northwind".to_string(),
            schema_name: SCHEMA.to_string(),
            source_path: Some(SOURCE.to_string()),
        },
    )
    .await
    .unwrap()
    .id
}

pub fn engine(pool: &PgPool) -> ImportEngine {
    ImportEngine::new(pool.clone(), EngineSettings::default())
}

pub fn engine_with_batch(pool: &PgPool, batch_size: usize) -> ImportEngine {
    ImportEngine::new(
        pool.clone(),
        EngineSettings {
            batch_size,
            lock_namespace: true,
        },
    )
}

pub fn table_request(database_id: i64, object_name: &str, force: bool) -> TableImportRequest {
    TableImportRequest {
        database_id,
        source_path: SOURCE.to_string(),
        object_name: object_name.to_string(),
        force,
    }
}

pub async fn table_exists(pool: &PgPool, table: &str) -> bool {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = $1 AND table_name = $2
         )",
    )
    .bind(SCHEMA)
    .bind(table)
    .fetch_one(pool)
    .await
    .unwrap();
    exists
}

pub async fn row_count(pool: &PgPool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM \"{SCHEMA}\".\"{table}\""))
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

/// (data_type, is_nullable, is_identity, is_generated) for one column.
pub async fn column_info(pool: &PgPool, table: &str, column: &str) -> (String, String, String, String) {
    sqlx::query_as(
        "SELECT data_type::text, is_nullable::text, is_identity::text, is_generated::text
         FROM information_schema.columns
         WHERE table_schema = $1 AND table_name = $2 AND column_name = $3",
    )
    .bind(SCHEMA)
    .bind(table)
    .bind(column)
    .fetch_one(pool)
    .await
    .unwrap()
}

/// Categories of every issue recorded against the most recent log entry.
pub async fn latest_log(pool: &PgPool) -> (String, serde_json::Value, Vec<(String, String)>) {
    let (id, status, details): (i64, String, serde_json::Value) = sqlx::query_as(
        "SELECT l.id, s.name, l.details
         FROM import_logs l JOIN import_log_statuses s ON s.id = l.status_id
         ORDER BY l.id DESC LIMIT 1",
    )
    .fetch_one(pool)
    .await
    .unwrap();
    let issues: Vec<(String, String)> = sqlx::query_as(
        "SELECT severity, category FROM import_issues WHERE import_log_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .unwrap();
    (status, details, issues)
}
