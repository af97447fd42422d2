//! Post-load reconciliation: identity sequences and secondary indexes.

use accessmig_core::column_plan::TablePlan;
use accessmig_core::ddl::{create_index_sql, reset_identity_sql};
use accessmig_core::naming::with_suffix;
use accessmig_db::repositories::CatalogRepo;
use sqlx::PgConnection;

use crate::error::ImportResult;
use crate::materializer::execute;

/// `base`, or the first `base_N` no relation in `schema` holds.
async fn free_relation_name(conn: &mut PgConnection, schema: &str, base: &str) -> ImportResult<String> {
    let mut name = base.to_string();
    let mut n = 2;
    while CatalogRepo::relation_kind(&mut *conn, schema, &name).await?.is_some() {
        name = with_suffix(base, n);
        n += 1;
    }
    if name != base {
        tracing::info!(index = %base, chosen = %name, "Index name taken in namespace; renamed");
    }
    Ok(name)
}

#[tracing::instrument(skip_all, fields(table = %plan.table_name))]
pub async fn reconcile(
    conn: &mut PgConnection,
    schema: &str,
    plan: &TablePlan,
    rows_loaded: u64,
) -> ImportResult<()> {
    if rows_loaded > 0 {
        for column in plan.identity_columns() {
            execute(conn, &reset_identity_sql(schema, &plan.table_name, &column.target_name)).await?;
            tracing::debug!(column = %column.target_name, "Identity sequence reset");
        }
    } else if plan.has_identity() {
        tracing::debug!("No rows loaded; identity sequences left at their start");
    }

    for index in &plan.indexes {
        let name = free_relation_name(conn, schema, &index.name).await?;
        execute(conn, &create_index_sql(schema, &plan.table_name, &name, index)).await?;
        tracing::debug!(index = %name, unique = index.unique, "Index created");
    }

    Ok(())
}
