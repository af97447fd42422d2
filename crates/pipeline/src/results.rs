//! Outbound results handed back to the surrounding product.

use accessmig_core::types::DbId;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableImportResult {
    pub success: bool,
    pub table_name: String,
    pub field_count: usize,
    pub row_count: u64,
    pub skipped_columns: Vec<String>,
    pub calculated_columns: Vec<String>,
    pub calculated_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryImportResult {
    pub success: bool,
    pub query_name: String,
    pub pg_object_type: String,
    pub warnings: Vec<String>,
    pub original_type: String,
    pub extracted_functions: Vec<String>,
}

/// A committed import and the audit entry recording it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome<T> {
    #[serde(flatten)]
    pub result: T,
    /// `None` when the audit write itself failed.
    pub import_log_id: Option<DbId>,
}
