//! Batch data loading into a freshly created table.

use accessmig_core::column_plan::TablePlan;
use accessmig_core::ddl::{effective_batch_size, insert_sql, row_values};
use accessmig_core::extraction::Row;
use sqlx::PgConnection;

use crate::error::{ImportError, ImportResult};

/// Insert every row in sequential multi-row batches.
///
/// Returns the number of rows loaded. Any failing batch aborts the load;
/// the caller rolls back the whole transaction.
#[tracing::instrument(skip_all, fields(table = %plan.table_name, rows = rows.len()))]
pub async fn load_rows(
    conn: &mut PgConnection,
    schema: &str,
    plan: &TablePlan,
    rows: &[Row],
    batch_size: usize,
) -> ImportResult<u64> {
    let columns = plan.insert_columns();
    if rows.is_empty() {
        return Ok(0);
    }

    let per_batch = effective_batch_size(batch_size, columns.len());
    let mut loaded = 0u64;

    for (index, chunk) in rows.chunks(per_batch).enumerate() {
        let sql = insert_sql(schema, &plan.table_name, &columns, chunk.len());
        let mut query = sqlx::query(&sql);
        for row in chunk {
            for value in row_values(row, &columns) {
                query = query.bind(value);
            }
        }
        let done = query
            .execute(&mut *conn)
            .await
            .map_err(|e| ImportError::statement(sql.as_str(), e))?;
        loaded += done.rows_affected();
        tracing::debug!(batch = index + 1, rows = chunk.len(), "Batch inserted");
    }

    Ok(loaded)
}
