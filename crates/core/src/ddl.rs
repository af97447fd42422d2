//! DDL and DML statement builders driven by a [`TablePlan`].
//!
//! Every identifier is emitted through [`quote_ident`]; row values are
//! never spliced into SQL but bound as text parameters and cast to the
//! column type inside the statement.

use crate::column_plan::{ColumnPlan, IndexPlan, TablePlan};
use crate::extraction::{CellValue, Row};
use crate::naming::{qualified_name, quote_ident, quote_literal};
use crate::type_mapping::SemanticType;

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Default rows per multi-row insert.
pub const DEFAULT_BATCH_SIZE: usize = 500;

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Kind of an existing relation, from `pg_class.relkind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    PartitionedTable,
    View,
    MaterializedView,
    ForeignTable,
    Other,
}

impl RelationKind {
    pub fn from_relkind(relkind: &str) -> Self {
        match relkind {
            "r" => Self::Table,
            "p" => Self::PartitionedTable,
            "v" => Self::View,
            "m" => Self::MaterializedView,
            "f" => Self::ForeignTable,
            _ => Self::Other,
        }
    }

    /// Keyword used in `DROP <keyword>` for this relation kind.
    pub fn drop_keyword(&self) -> &'static str {
        match self {
            Self::Table | Self::PartitionedTable | Self::Other => "TABLE",
            Self::View => "VIEW",
            Self::MaterializedView => "MATERIALIZED VIEW",
            Self::ForeignTable => "FOREIGN TABLE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Table | Self::PartitionedTable => "table",
            Self::View => "view",
            Self::MaterializedView => "materialized view",
            Self::ForeignTable => "foreign table",
            Self::Other => "relation",
        }
    }
}

pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// `DROP ... CASCADE` for an existing relation of the given kind.
pub fn drop_relation_sql(schema: &str, name: &str, kind: RelationKind) -> String {
    format!(
        "DROP {} IF EXISTS {} CASCADE",
        kind.drop_keyword(),
        qualified_name(schema, name)
    )
}

/// `DROP FUNCTION ... CASCADE` for one overload, given its `regprocedure`
/// text as rendered by the catalog (already quoted where required).
pub fn drop_function_sql(signature: &str) -> String {
    format!("DROP FUNCTION IF EXISTS {signature} CASCADE")
}

/// Fix a routine's name resolution to `schema` for every later call.
///
/// Routine bodies resolve names at call time against the caller's
/// `search_path`, not the one in effect when they were created.
pub fn pin_search_path_sql(signature: &str, schema: &str) -> String {
    format!(
        "ALTER FUNCTION {signature} SET search_path = {}, public",
        quote_ident(schema)
    )
}

/// Transaction-scoped advisory lock serialising imports into one namespace.
pub fn namespace_lock_sql() -> &'static str {
    "SELECT pg_advisory_xact_lock(hashtext($1))"
}

// ---------------------------------------------------------------------------
// CREATE TABLE
// ---------------------------------------------------------------------------

fn column_clause(column: &ColumnPlan) -> String {
    let name = quote_ident(&column.target_name);
    let ty = &column.target_type;

    if column.is_auto_number {
        return format!("{name} {ty} GENERATED BY DEFAULT AS IDENTITY");
    }
    if let Some(expr) = &column.generated_sql {
        return format!("{name} {ty} GENERATED ALWAYS AS ({expr}) STORED");
    }

    let mut clause = format!("{name} {ty}");
    if column.required {
        clause.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default_sql {
        clause.push_str(" DEFAULT ");
        clause.push_str(default);
    }
    clause
}

/// `CREATE TABLE` for the plan, including the primary key clause.
pub fn create_table_sql(schema: &str, plan: &TablePlan) -> String {
    let mut clauses: Vec<String> = plan.columns.iter().map(column_clause).collect();

    if let Some(pk) = &plan.primary_key {
        let cols: Vec<String> = pk.iter().map(|c| quote_ident(c)).collect();
        clauses.push(format!("PRIMARY KEY ({})", cols.join(", ")));
    }

    format!(
        "CREATE TABLE {} (\n    {}\n)",
        qualified_name(schema, &plan.table_name),
        clauses.join(",\n    ")
    )
}

// ---------------------------------------------------------------------------
// Post-load
// ---------------------------------------------------------------------------

/// `CREATE [UNIQUE] INDEX` for a secondary index under `name`.
///
/// The caller picks a name that is free in the namespace; a taken name
/// fails the statement rather than silently skipping the index.
pub fn create_index_sql(schema: &str, table: &str, name: &str, index: &IndexPlan) -> String {
    let cols: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(name),
        qualified_name(schema, table),
        cols.join(", ")
    )
}

/// Move an identity column's sequence past the largest loaded value.
///
/// Only valid once the table holds at least one row.
pub fn reset_identity_sql(schema: &str, table: &str, column: &str) -> String {
    let relation = qualified_name(schema, table);
    format!(
        "SELECT setval(pg_get_serial_sequence({}, {}), GREATEST(MAX({}), 1)) FROM {relation}",
        quote_literal(&relation),
        quote_literal(column),
        quote_ident(column),
    )
}

// ---------------------------------------------------------------------------
// Batch inserts
// ---------------------------------------------------------------------------

/// Rows per statement, bounded so the statement stays under the bind limit.
pub fn effective_batch_size(configured: usize, insert_columns: usize) -> usize {
    let configured = configured.max(1);
    if insert_columns == 0 {
        return configured;
    }
    configured.min(MAX_BIND_PARAMS / insert_columns).max(1)
}

/// Type that a bound text parameter is cast to before assignment.
///
/// Bounded strings are cast to `text` so that over-long values fail on
/// assignment instead of being silently truncated by an explicit cast.
fn bind_cast_type(target_type: &str) -> &str {
    let lower = target_type.trim_start().to_ascii_lowercase();
    if lower.starts_with("varchar") || lower.starts_with("character varying") {
        "text"
    } else {
        target_type
    }
}

/// Multi-row `INSERT` for `row_count` rows over `columns`.
///
/// Parameters are numbered row-major from `$1`. When any column is an
/// identity, explicit values override the generator.
pub fn insert_sql(schema: &str, table: &str, columns: &[&ColumnPlan], row_count: usize) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.target_name)).collect();
    let overriding = if columns.iter().any(|c| c.is_auto_number) {
        " OVERRIDING SYSTEM VALUE"
    } else {
        ""
    };

    let mut param = 0usize;
    let tuples: Vec<String> = (0..row_count)
        .map(|_| {
            let casts: Vec<String> = columns
                .iter()
                .map(|c| {
                    param += 1;
                    format!("CAST(${param} AS {})", bind_cast_type(&c.target_type))
                })
                .collect();
            format!("({})", casts.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}){overriding} VALUES {}",
        qualified_name(schema, table),
        column_list.join(", "),
        tuples.join(", ")
    )
}

fn lookup<'a>(row: &'a Row, name: &str) -> Option<&'a CellValue> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Bound values for one row, aligned with `columns`. Missing fields are
/// explicit nulls.
pub fn row_values(row: &Row, columns: &[&ColumnPlan]) -> Vec<Option<String>> {
    columns
        .iter()
        .map(|c| lookup(row, &c.original_name).and_then(|v| coerce_value(v, &c.semantic_type)))
        .collect()
}

fn truthy_text(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "-1" | "1" | "true" | "yes" | "on" | "t" | "y" => Some("true"),
        "0" | "false" | "no" | "off" | "f" | "n" => Some("false"),
        _ => None,
    }
}

/// Render a cell as the text parameter for a column of `semantic` type.
pub fn coerce_value(value: &CellValue, semantic: &SemanticType) -> Option<String> {
    let is_bool = matches!(semantic, SemanticType::YesNo);
    let integral = semantic.is_integral();
    let is_numeric = matches!(semantic, SemanticType::Number(_) | SemanticType::Currency);

    match value {
        CellValue::Null => None,
        CellValue::Bool(b) if is_bool => Some(b.to_string()),
        // Legacy True is -1 when stored as a number.
        CellValue::Bool(b) if integral || is_numeric => {
            Some(if *b { "-1" } else { "0" }.to_string())
        }
        CellValue::Bool(b) => Some(b.to_string()),
        CellValue::Integer(i) if is_bool => Some((*i != 0).to_string()),
        CellValue::Integer(i) => Some(i.to_string()),
        CellValue::Float(f) if is_bool => Some((*f != 0.0).to_string()),
        CellValue::Float(f) if integral && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        CellValue::Float(f) => Some(f.to_string()),
        CellValue::Text(s) if is_bool => {
            Some(truthy_text(s).map(str::to_string).unwrap_or_else(|| s.clone()))
        }
        CellValue::Text(s) if integral => match s.trim().parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && s.contains(['.', 'e', 'E']) => Some(format!("{}", f as i64)),
            _ => Some(s.clone()),
        },
        CellValue::Text(s) => Some(s.clone()),
        CellValue::Json(v) => Some(v.to_string()),
    }
}
