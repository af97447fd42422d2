//! The per-import table plan.
//!
//! A [`TablePlan`] is built once from an extracted table payload and then
//! drives every later step: `CREATE TABLE`, the batch inserts, identity
//! resets, and index creation. Nothing downstream re-derives names or types.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::expression::{convert_expression, ExpressionContext};
use crate::extraction::{FieldType, TablePayload};
use crate::issues::{
    IssueDraft, CATEGORY_CALCULATED_COLUMN, CATEGORY_DEFAULT_VALUE, CATEGORY_SKIPPED_COLUMN,
    CATEGORY_SKIPPED_INDEX, CATEGORY_SKIPPED_PRIMARY_KEY, CATEGORY_TYPE_FALLBACK,
};
use crate::naming::{dedupe_identifiers, index_name, primary_key_name, sanitize_identifier};
use crate::type_mapping::{
    is_safe_type_literal, semantic_type, SemanticType, CALCULATED_TYPE_CODE,
};

/// One target column.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnPlan {
    pub original_name: String,
    pub target_name: String,
    pub semantic_type: SemanticType,
    /// Concrete PostgreSQL type.
    pub target_type: String,
    pub required: bool,
    pub is_auto_number: bool,
    pub is_calculated: bool,
    /// Legacy formula, for calculated columns.
    pub expression: Option<String>,
    /// Converted generation expression; `None` means the column degrades
    /// to a plain nullable column.
    pub generated_sql: Option<String>,
    /// Converted default expression.
    pub default_sql: Option<String>,
}

impl ColumnPlan {
    /// Whether rows supply a value for this column.
    pub fn is_insertable(&self) -> bool {
        !self.is_calculated
    }
}

/// A secondary index to build after loading.
#[derive(Debug, Clone, Serialize)]
pub struct IndexPlan {
    pub source_name: String,
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Everything needed to materialize and load one legacy table.
#[derive(Debug, Clone, Serialize)]
pub struct TablePlan {
    pub source_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnPlan>,
    pub primary_key: Option<Vec<String>>,
    pub indexes: Vec<IndexPlan>,
    /// Names of source columns the extractor could not represent.
    pub skipped_columns: Vec<String>,
    /// Deviations found while planning.
    pub issues: Vec<IssueDraft>,
}

impl TablePlan {
    /// Columns that receive explicit values, in plan order.
    pub fn insert_columns(&self) -> Vec<&ColumnPlan> {
        self.columns.iter().filter(|c| c.is_insertable()).collect()
    }

    pub fn identity_columns(&self) -> Vec<&ColumnPlan> {
        self.columns.iter().filter(|c| c.is_auto_number).collect()
    }

    pub fn has_identity(&self) -> bool {
        self.columns.iter().any(|c| c.is_auto_number)
    }

    /// Target names of all calculated columns.
    pub fn calculated_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_calculated)
            .map(|c| c.target_name.clone())
            .collect()
    }

    /// Messages of every calculated-column warning.
    pub fn calculated_warnings(&self) -> Vec<String> {
        self.issues
            .iter()
            .filter(|i| i.category == CATEGORY_CALCULATED_COLUMN)
            .map(|i| i.message.clone())
            .collect()
    }

    /// Drop every generation expression, recording one warning per column.
    ///
    /// Used when the store rejects the generated columns as a whole.
    pub fn degrade_generated_columns(&mut self, reason: &str) {
        for column in self.columns.iter_mut() {
            if column.generated_sql.take().is_some() {
                self.issues.push(
                    IssueDraft::warning(
                        CATEGORY_CALCULATED_COLUMN,
                        format!(
                            "Calculated column '{}' was rejected by the database ({reason}); \
                             imported as a plain nullable column",
                            column.original_name
                        ),
                    )
                    .with_suggestion("Recreate the calculation as a view or in application code"),
                );
            }
        }
    }

    pub fn has_generated_columns(&self) -> bool {
        self.columns.iter().any(|c| c.generated_sql.is_some())
    }

    pub fn has_defaults(&self) -> bool {
        self.columns.iter().any(|c| c.default_sql.is_some())
    }

    /// Drop every column default, recording one warning per column.
    pub fn drop_defaults(&mut self, reason: &str) {
        for column in self.columns.iter_mut() {
            if let Some(default) = column.default_sql.take() {
                self.issues.push(IssueDraft::warning(
                    CATEGORY_DEFAULT_VALUE,
                    format!(
                        "Default {default} of column '{}' was rejected by the database ({reason}) and was dropped",
                        column.original_name
                    ),
                ));
            }
        }
    }
}

/// Convert a legacy default value for a column of the given type.
///
/// Yes/No columns take the legacy numeric and word forms of true and false.
fn convert_default(
    default: &str,
    semantic: &SemanticType,
    ctx: &ExpressionContext,
) -> Result<String, String> {
    if *semantic == SemanticType::YesNo {
        let body = default.trim();
        let body = body.strip_prefix('=').unwrap_or(body).trim();
        match body.to_ascii_lowercase().as_str() {
            "-1" | "1" | "true" | "yes" | "on" => return Ok("TRUE".to_string()),
            "0" | "false" | "no" | "off" => return Ok("FALSE".to_string()),
            _ => {}
        }
    }
    convert_expression(default, ctx)
}

fn is_calculated(field: &crate::extraction::FieldDescriptor) -> bool {
    field.is_calculated || field.field_type == FieldType::Code(CALCULATED_TYPE_CODE)
}

/// Build the table plan for one extracted legacy table.
///
/// Fails only on structural problems: an unusable object name, no
/// insertable columns, or more than one primary index.
pub fn build_table_plan(source_name: &str, payload: &TablePayload) -> Result<TablePlan, CoreError> {
    let table_name = sanitize_identifier(source_name);
    if table_name.is_empty() {
        return Err(CoreError::Validation(format!(
            "Object name '{source_name}' does not produce a usable identifier"
        )));
    }

    if payload.fields.is_empty() {
        return Err(CoreError::Validation(format!(
            "Table '{source_name}' has no importable columns"
        )));
    }
    if payload.fields.iter().all(is_calculated) {
        return Err(CoreError::Validation(format!(
            "Table '{source_name}' has only calculated columns; nothing can be loaded"
        )));
    }

    let primaries = payload.indexes.iter().filter(|i| i.primary).count();
    if primaries > 1 {
        return Err(CoreError::Validation(format!(
            "Table '{source_name}' declares {primaries} primary indexes; at most one is allowed"
        )));
    }

    let mut issues = Vec::new();

    for skipped in &payload.skipped_columns {
        let type_label = skipped.column_type.as_deref().unwrap_or("unknown");
        issues.push(
            IssueDraft::warning(
                CATEGORY_SKIPPED_COLUMN,
                format!(
                    "Column '{}' (type {type_label}) is not supported and was skipped",
                    skipped.name
                ),
            )
            .with_suggestion("Migrate this column's content manually"),
        );
    }

    let sanitized: Vec<String> = payload
        .fields
        .iter()
        .map(|f| sanitize_identifier(&f.name))
        .collect();
    let targets = dedupe_identifiers(&sanitized);

    let mut columns = Vec::with_capacity(payload.fields.len());
    for (field, target_name) in payload.fields.iter().zip(targets) {
        let calculated = is_calculated(field);
        let semantic = semantic_type(field);
        let mut target_type = semantic.to_pg_type();

        if let SemanticType::Custom(raw) = &semantic {
            if !is_safe_type_literal(raw) {
                issues.push(IssueDraft::warning(
                    CATEGORY_TYPE_FALLBACK,
                    format!(
                        "Column '{}' declares unsupported type '{raw}'; imported as text",
                        field.name
                    ),
                ));
                target_type = "text".to_string();
            }
        }

        columns.push(ColumnPlan {
            original_name: field.name.clone(),
            target_name,
            is_auto_number: semantic.is_identity(),
            semantic_type: semantic,
            target_type,
            required: field.required && !calculated,
            is_calculated: calculated,
            expression: field.expression.clone().filter(|e| !e.trim().is_empty()),
            generated_sql: None,
            default_sql: None,
        });
    }

    // Generated columns may reference stored columns only.
    let stored_ctx = ExpressionContext::for_columns(
        columns
            .iter()
            .filter(|c| !c.is_calculated)
            .map(|c| (c.original_name.as_str(), c.target_name.as_str())),
    );
    let defaults_ctx = ExpressionContext::for_defaults();

    for (column, field) in columns.iter_mut().zip(&payload.fields) {
        if column.is_calculated {
            match column.expression.as_deref() {
                None => issues.push(
                    IssueDraft::warning(
                        CATEGORY_CALCULATED_COLUMN,
                        format!(
                            "Calculated column '{}' has no expression; imported as a plain nullable column",
                            column.original_name
                        ),
                    )
                    .with_suggestion("Recreate the calculation as a view or in application code"),
                ),
                Some(expr) => match convert_expression(expr, &stored_ctx) {
                    Ok(sql) => column.generated_sql = Some(sql),
                    Err(reason) => issues.push(
                        IssueDraft::warning(
                            CATEGORY_CALCULATED_COLUMN,
                            format!(
                                "Calculated column '{}' expression '{expr}' could not be converted ({reason}); \
                                 imported as a plain nullable column",
                                column.original_name
                            ),
                        )
                        .with_suggestion("Recreate the calculation as a view or in application code"),
                    ),
                },
            }
            continue;
        }

        if column.is_auto_number {
            continue;
        }

        let Some(default) = field.default_value.as_deref().filter(|d| !d.trim().is_empty())
        else {
            continue;
        };
        match convert_default(default, &column.semantic_type, &defaults_ctx) {
            Ok(sql) => column.default_sql = Some(sql),
            Err(reason) => issues.push(IssueDraft::warning(
                CATEGORY_DEFAULT_VALUE,
                format!(
                    "Default value '{default}' of column '{}' could not be converted ({reason}) and was dropped",
                    column.original_name
                ),
            )),
        }
    }

    let lookup: HashMap<String, String> = columns
        .iter()
        .map(|c| (c.original_name.to_lowercase(), c.target_name.clone()))
        .collect();
    let resolve = |fields: &[String]| -> Option<Vec<String>> {
        fields
            .iter()
            .map(|f| lookup.get(&f.to_lowercase()).cloned())
            .collect()
    };

    let mut primary_key = None;
    if let Some(pk) = payload.indexes.iter().find(|i| i.primary) {
        match resolve(&pk.fields) {
            Some(cols) if !cols.is_empty() => primary_key = Some(cols),
            _ => issues.push(IssueDraft::warning(
                CATEGORY_SKIPPED_PRIMARY_KEY,
                format!(
                    "Primary key '{}' references columns that were not imported ({}); no primary key was created",
                    pk.name,
                    pk.fields.join(", ")
                ),
            )),
        }
    }

    let mut candidates = Vec::new();
    for index in payload.indexes.iter().filter(|i| !i.primary) {
        match resolve(&index.fields) {
            Some(cols) if !cols.is_empty() => candidates.push((index, cols)),
            _ => issues.push(IssueDraft::warning(
                CATEGORY_SKIPPED_INDEX,
                format!(
                    "Index '{}' has no fields or references columns that were not imported; skipped",
                    index.name
                ),
            )),
        }
    }
    // The primary key index name is reserved even when no key is declared.
    let mut index_names: Vec<String> = std::iter::once(primary_key_name(&table_name))
        .chain(
            candidates
                .iter()
                .map(|(index, _)| index_name(&table_name, &index.name)),
        )
        .collect();
    index_names = dedupe_identifiers(&index_names);
    let indexes = candidates
        .into_iter()
        .zip(index_names.into_iter().skip(1))
        .map(|((index, columns), name)| IndexPlan {
            source_name: index.name.clone(),
            name,
            columns,
            unique: index.unique,
        })
        .collect();

    Ok(TablePlan {
        source_name: source_name.to_string(),
        table_name,
        columns,
        primary_key,
        indexes,
        skipped_columns: payload
            .skipped_columns
            .iter()
            .map(|s| s.name.clone())
            .collect(),
        issues,
    })
}
