//! Materialization of converted queries as views or functions.

use accessmig_core::conversion::{ConvertedQuery, TargetObjectKind};
use accessmig_core::ddl::{drop_function_sql, drop_relation_sql, pin_search_path_sql, RelationKind};
use accessmig_core::error::CoreError;
use accessmig_core::naming::quote_ident;
use accessmig_db::repositories::CatalogRepo;
use sqlx::PgConnection;

use crate::error::ImportResult;
use crate::materializer::execute;

/// Drop or reject whatever already holds the converted object's name.
///
/// Force replaces views and functions only; a table of the same name is
/// always a conflict.
async fn clear_existing(
    conn: &mut PgConnection,
    schema: &str,
    converted: &ConvertedQuery,
    force: bool,
) -> ImportResult<()> {
    let name = &converted.pg_object_name;
    match converted.pg_object_type {
        TargetObjectKind::View => {
            let Some(kind) = CatalogRepo::relation_kind(&mut *conn, schema, name).await? else {
                return Ok(());
            };
            let replaceable = matches!(kind, RelationKind::View | RelationKind::MaterializedView);
            if !force || !replaceable {
                return Err(CoreError::Conflict(format!(
                    "A {} named '{name}' already exists in schema '{schema}'",
                    kind.label()
                ))
                .into());
            }
            execute(conn, &drop_relation_sql(schema, name, kind)).await?;
        }
        TargetObjectKind::Function => {
            let signatures = CatalogRepo::function_signatures(&mut *conn, schema, name).await?;
            if signatures.is_empty() {
                return Ok(());
            }
            if !force {
                return Err(CoreError::Conflict(format!(
                    "A function named '{name}' already exists in schema '{schema}'"
                ))
                .into());
            }
            for signature in &signatures {
                execute(conn, &drop_function_sql(signature)).await?;
            }
        }
    }
    tracing::info!(object = %name, kind = %converted.pg_object_type, "Dropped existing object for forced re-import");
    Ok(())
}

/// Execute the converted statements inside the open transaction.
///
/// On failure the whole statement set and the source query are logged
/// before the error propagates.
#[tracing::instrument(skip_all, fields(schema = %schema, object = %converted.pg_object_name))]
pub async fn materialize_query(
    conn: &mut PgConnection,
    schema: &str,
    converted: &ConvertedQuery,
    source_sql: &str,
    force: bool,
) -> ImportResult<()> {
    clear_existing(conn, schema, converted, force).await?;

    execute(
        conn,
        &format!("SET LOCAL search_path TO {}, public", quote_ident(schema)),
    )
    .await?;

    for statement in converted.executable_statements() {
        if let Err(err) = execute(conn, statement).await {
            tracing::error!(
                error = %err,
                statements = ?converted.statements,
                source_sql,
                "Converted query failed; rolling back"
            );
            return Err(err);
        }
    }

    pin_routines(conn, schema, converted).await
}

/// Pin the namespace on the converted function and every helper the
/// converter extracted, so calls from any session resolve the same tables.
async fn pin_routines(
    conn: &mut PgConnection,
    schema: &str,
    converted: &ConvertedQuery,
) -> ImportResult<()> {
    let mut names: Vec<&str> = converted
        .extracted_functions
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    if converted.pg_object_type == TargetObjectKind::Function {
        names.push(&converted.pg_object_name);
    }

    for name in names {
        for signature in CatalogRepo::function_signatures(&mut *conn, schema, name).await? {
            execute(conn, &pin_search_path_sql(&signature, schema)).await?;
            tracing::debug!(routine = %signature, "Pinned routine search_path");
        }
    }
    Ok(())
}
