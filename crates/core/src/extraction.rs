//! Typed boundary for payloads produced by the external extraction process.
//!
//! The extractor prints a single JSON object on stdout. Its shape depends on
//! the legacy object kind: tables carry fields, indexes, and rows; queries
//! carry their SQL text. Payloads are parsed eagerly into the types below
//! and anything that does not fit is rejected rather than guessed at.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Field and index descriptors
// ---------------------------------------------------------------------------

/// A legacy type, either a numeric type code or a symbolic name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldType {
    Code(i64),
    Name(String),
}

impl Default for FieldType {
    fn default() -> Self {
        Self::Code(10)
    }
}

/// One column of a legacy table as reported by the extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, alias = "maxLength")]
    pub size: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub field_size: Option<String>,
    #[serde(default)]
    pub is_auto_number: bool,
    #[serde(default)]
    pub is_calculated: bool,
    #[serde(default)]
    pub expression: Option<String>,
    /// Declared result type of a calculated field.
    #[serde(default)]
    pub result_type: Option<FieldType>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub default_value: Option<String>,
}

/// A legacy index. At most one per table is primary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary: bool,
}

/// A source column the extractor could not represent (attachments, OLE, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedColumn {
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "string_or_number")]
    pub column_type: Option<String>,
}

/// Accept either a JSON string or a JSON number, normalizing to a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Row values
// ---------------------------------------------------------------------------

/// A single cell of extracted row data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Nested arrays or objects, kept as JSON.
    Json(serde_json::Value),
}

/// One extracted row, keyed by legacy field name.
pub type Row = HashMap<String, CellValue>;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Structure and data of a legacy table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub skipped_columns: Vec<SkippedColumn>,
}

/// A legacy stored query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPayload {
    pub sql: String,
    pub query_type: String,
    /// Set when parameter types could not be determined unambiguously.
    #[serde(default)]
    pub param_warning: Option<String>,
}

/// Any payload the extractor can produce.
#[derive(Debug, Clone)]
pub enum ExtractionPayload {
    Table(TablePayload),
    Query(QueryPayload),
}

/// Locate the JSON object in raw extractor output.
///
/// The extractor may print diagnostics before or after the payload, so the
/// object is taken to span from the first `{` to the last `}`.
fn locate_object(output: &str) -> Result<&str, CoreError> {
    let start = output.find('{');
    let end = output.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(&output[start..=end]),
        _ => Err(CoreError::Extraction(
            "No JSON object found in extractor output".to_string(),
        )),
    }
}

/// Parse raw extractor output into a typed payload.
///
/// A `{"error": "..."}` envelope is reported as an extraction failure.
/// Objects with `fields` are tables, objects with `sql` are queries, and
/// anything else is rejected.
pub fn parse_extraction_output(output: &str) -> Result<ExtractionPayload, CoreError> {
    let raw = locate_object(output)?;
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| CoreError::Extraction(format!("Invalid extractor JSON: {e}")))?;

    let obj = value
        .as_object()
        .ok_or_else(|| CoreError::Extraction("Extractor output is not a JSON object".into()))?;

    if let Some(message) = obj.get("error").and_then(|e| e.as_str()) {
        return Err(CoreError::Extraction(message.to_string()));
    }

    if obj.contains_key("fields") {
        let table = serde_json::from_value::<TablePayload>(value)
            .map_err(|e| CoreError::Extraction(format!("Malformed table payload: {e}")))?;
        return Ok(ExtractionPayload::Table(table));
    }

    if obj.contains_key("sql") {
        let query = serde_json::from_value::<QueryPayload>(value)
            .map_err(|e| CoreError::Extraction(format!("Malformed query payload: {e}")))?;
        return Ok(ExtractionPayload::Query(query));
    }

    Err(CoreError::Extraction(
        "Extractor payload is neither a table nor a query".to_string(),
    ))
}

/// Parse extractor output that must describe a table.
pub fn parse_table_payload(output: &str) -> Result<TablePayload, CoreError> {
    match parse_extraction_output(output)? {
        ExtractionPayload::Table(table) => Ok(table),
        ExtractionPayload::Query(_) => Err(CoreError::Extraction(
            "Expected a table payload but received a query payload".to_string(),
        )),
    }
}

/// Parse extractor output that must describe a query.
pub fn parse_query_payload(output: &str) -> Result<QueryPayload, CoreError> {
    match parse_extraction_output(output)? {
        ExtractionPayload::Query(query) => Ok(query),
        ExtractionPayload::Table(_) => Err(CoreError::Extraction(
            "Expected a query payload but received a table payload".to_string(),
        )),
    }
}
