//! Read-only lookups against the PostgreSQL system catalog.

use std::collections::HashMap;

use accessmig_core::ddl::RelationKind;
use sqlx::PgExecutor;

/// Catalog lookups scoped to one target namespace.
pub struct CatalogRepo;

impl CatalogRepo {
    /// Kind of the relation `schema.name`, if one exists.
    pub async fn relation_kind<'e, E>(
        executor: E,
        schema: &str,
        name: &str,
    ) -> Result<Option<RelationKind>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT c.relkind::text
             FROM pg_class c
             JOIN pg_namespace n ON n.oid = c.relnamespace
             WHERE n.nspname = $1 AND c.relname = $2",
        )
        .bind(schema)
        .bind(name)
        .fetch_optional(executor)
        .await?;
        Ok(row.map(|(relkind,)| RelationKind::from_relkind(&relkind)))
    }

    /// `regprocedure` signatures of every overload of `schema.name`.
    pub async fn function_signatures<'e, E>(
        executor: E,
        schema: &str,
        name: &str,
    ) -> Result<Vec<String>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT p.oid::regprocedure::text
             FROM pg_proc p
             JOIN pg_namespace n ON n.oid = p.pronamespace
             WHERE n.nspname = $1 AND p.proname = $2
             ORDER BY p.oid",
        )
        .bind(schema)
        .bind(name)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(sig,)| sig).collect())
    }

    /// Table name -> column name -> data type for every table in `schema`.
    pub async fn column_types<'e, E>(
        executor: E,
        schema: &str,
    ) -> Result<HashMap<String, HashMap<String, String>>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT table_name::text, column_name::text, data_type::text
             FROM information_schema.columns
             WHERE table_schema = $1
             ORDER BY table_name, ordinal_position",
        )
        .bind(schema)
        .fetch_all(executor)
        .await?;

        let mut map: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (table, column, data_type) in rows {
            map.entry(table).or_default().insert(column, data_type);
        }
        Ok(map)
    }

    /// Row count of `schema.table`.
    pub async fn count_rows<'e, E>(executor: E, schema: &str, table: &str) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT COUNT(*) FROM {}",
            accessmig_core::naming::qualified_name(schema, table)
        );
        let (count,): (i64,) = sqlx::query_as(&query).fetch_one(executor).await?;
        Ok(count)
    }
}
