//! Schema materialization: namespace lock, existence check, forced drop,
//! and `CREATE TABLE` with degraded retries for generated columns and defaults.

use accessmig_core::column_plan::TablePlan;
use accessmig_core::ddl::{
    create_schema_sql, create_table_sql, drop_relation_sql, namespace_lock_sql,
};
use accessmig_core::error::CoreError;
use accessmig_db::repositories::CatalogRepo;
use sqlx::{Connection, PgConnection};

use crate::error::{ImportError, ImportResult};

/// Execute one generated statement, attaching it to any failure.
pub(crate) async fn execute(conn: &mut PgConnection, sql: &str) -> ImportResult<u64> {
    sqlx::query(sql)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
        .map_err(|e| ImportError::statement(sql, e))
}

/// Serialise imports into `schema` for the rest of the transaction and
/// make sure the namespace exists.
pub(crate) async fn prepare_namespace(
    conn: &mut PgConnection,
    schema: &str,
    lock: bool,
) -> ImportResult<()> {
    if lock {
        sqlx::query(namespace_lock_sql())
            .bind(schema)
            .execute(&mut *conn)
            .await?;
    }
    execute(conn, &create_schema_sql(schema)).await?;
    Ok(())
}

/// Create the plan's table inside the open transaction.
///
/// An existing relation of the same name is a conflict unless `force`,
/// in which case it is dropped first.
#[tracing::instrument(skip_all, fields(schema = %schema, table = %plan.table_name))]
pub async fn materialize_table(
    conn: &mut PgConnection,
    schema: &str,
    plan: &mut TablePlan,
    force: bool,
) -> ImportResult<()> {
    if let Some(kind) = CatalogRepo::relation_kind(&mut *conn, schema, &plan.table_name).await? {
        if !force {
            return Err(CoreError::Conflict(format!(
                "A {} named '{}' already exists in schema '{schema}'",
                kind.label(),
                plan.table_name
            ))
            .into());
        }
        tracing::info!(kind = kind.label(), "Dropping existing relation for forced re-import");
        execute(conn, &drop_relation_sql(schema, &plan.table_name, kind)).await?;
    }

    loop {
        let sql = create_table_sql(schema, plan);
        if !plan.has_generated_columns() && !plan.has_defaults() {
            execute(conn, &sql).await?;
            return Ok(());
        }

        // Generated columns and defaults may still be rejected by the store,
        // e.g. a non-immutable expression or a default of the wrong type.
        // Isolate the attempt behind a savepoint and retry with less.
        let mut savepoint = conn.begin().await?;
        let err = match sqlx::query(&sql).execute(&mut *savepoint).await {
            Ok(_) => {
                savepoint.commit().await?;
                return Ok(());
            }
            Err(err) => err,
        };
        savepoint.rollback().await?;

        let reason = err
            .as_database_error()
            .map(|db| db.message().to_string())
            .unwrap_or_else(|| err.to_string());
        let blames_default = reason.contains("default");
        if plan.has_generated_columns() && !(blames_default && plan.has_defaults()) {
            tracing::warn!(error = %reason, "Generated columns rejected; retrying without them");
            plan.degrade_generated_columns(&reason);
        } else {
            tracing::warn!(error = %reason, "Column defaults rejected; retrying without them");
            plan.drop_defaults(&reason);
        }
    }
}
