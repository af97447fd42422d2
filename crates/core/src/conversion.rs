//! Boundary types for the dialect-conversion collaborator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::extraction::QueryPayload;

/// Kind of object a converted query materializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetObjectKind {
    View,
    Function,
}

impl TargetObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Function => "function",
        }
    }
}

impl std::fmt::Display for TargetObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Helper routine the converter had to synthesize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFunction {
    pub name: String,
}

/// Everything the converter needs to rewrite one legacy query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub query_name: String,
    pub query: QueryPayload,
    pub schema_name: String,
    /// Table name -> column name -> data type, for the target namespace.
    pub column_types: HashMap<String, HashMap<String, String>>,
    /// Form control name -> column name.
    pub control_mapping: HashMap<String, String>,
}

/// The converter's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedQuery {
    pub statements: Vec<String>,
    pub pg_object_name: String,
    pub pg_object_type: TargetObjectKind,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub extracted_functions: Vec<ExtractedFunction>,
}

impl ConvertedQuery {
    /// Statements that actually need executing, in order.
    pub fn executable_statements(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .map(String::as_str)
            .filter(|s| !is_comment_only(s))
    }

    /// Reject output the materializer cannot act on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.statements.is_empty() {
            return Err(CoreError::Validation(
                "Query conversion produced no statements".to_string(),
            ));
        }
        if self.executable_statements().next().is_none() {
            return Err(CoreError::Validation(
                "Query conversion produced only comments".to_string(),
            ));
        }
        if self.pg_object_name.trim().is_empty() {
            return Err(CoreError::Validation(
                "Query conversion produced no target object name".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether a statement holds nothing but whitespace and SQL comments.
pub fn is_comment_only(statement: &str) -> bool {
    let mut rest = statement.trim_start();
    loop {
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(end) => after[end + 1..].trim_start(),
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(end) => after[end + 2..].trim_start(),
                None => return true,
            };
        } else {
            return false;
        }
    }
}
