//! Status, object-kind, and issue vocabulary shared by the engine and the
//! audit tables.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source object type
// ---------------------------------------------------------------------------

/// Kind of legacy object an import attempt concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceObjectType {
    Table,
    Query,
    Form,
    Report,
    Module,
    Macro,
}

impl SourceObjectType {
    /// Return the type name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Query => "query",
            Self::Form => "form",
            Self::Report => "report",
            Self::Module => "module",
            Self::Macro => "macro",
        }
    }

    /// Parse a type string. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "table" => Some(Self::Table),
            "query" => Some(Self::Query),
            "form" => Some(Self::Form),
            "report" => Some(Self::Report),
            "module" => Some(Self::Module),
            "macro" => Some(Self::Macro),
            _ => None,
        }
    }

    /// All valid type values.
    pub const ALL: &'static [&'static str] =
        &["table", "query", "form", "report", "module", "macro"];
}

impl std::fmt::Display for SourceObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Import status
// ---------------------------------------------------------------------------

/// Outcome of one import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Success,
    Error,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub const ALL: &'static [&'static str] = &["success", "error"];
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Issue severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Issue categories
// ---------------------------------------------------------------------------

pub const CATEGORY_SKIPPED_COLUMN: &str = "skipped-column";
pub const CATEGORY_CALCULATED_COLUMN: &str = "calculated-column";
pub const CATEGORY_CONVERSION_WARNING: &str = "conversion-warning";
pub const CATEGORY_TYPE_FALLBACK: &str = "type-fallback";
pub const CATEGORY_DEFAULT_VALUE: &str = "default-value";
pub const CATEGORY_SKIPPED_INDEX: &str = "skipped-index";
pub const CATEGORY_SKIPPED_PRIMARY_KEY: &str = "skipped-primary-key";
pub const CATEGORY_IMPORT_FAILED: &str = "import-failed";
pub const CATEGORY_CONFLICT: &str = "conflict";
pub const CATEGORY_INVALID_PAYLOAD: &str = "invalid-payload";

// ---------------------------------------------------------------------------
// Issue value
// ---------------------------------------------------------------------------

/// A deviation or failure recorded against one import attempt.
///
/// Built by the engine as imports run; persisted by the audit recorder
/// once the attempt's log row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDraft {
    pub severity: Severity,
    pub category: &'static str,
    pub message: String,
    pub suggestion: Option<String>,
}

impl IssueDraft {
    pub fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            category,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_round_trip() {
        for s in SourceObjectType::ALL {
            let t = SourceObjectType::from_str(s).unwrap();
            assert_eq!(t.as_str(), *s);
        }
        assert!(SourceObjectType::from_str("page").is_none());
    }

    #[test]
    fn status_round_trip() {
        for s in ImportStatus::ALL {
            assert_eq!(ImportStatus::from_str(s).unwrap().as_str(), *s);
        }
        assert_eq!(format!("{}", ImportStatus::Error), "error");
    }

    #[test]
    fn severity_parses() {
        assert_eq!(Severity::from_str("warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_str("fatal"), None);
    }

    #[test]
    fn issue_builders() {
        let issue = IssueDraft::warning(CATEGORY_CALCULATED_COLUMN, "lost formula")
            .with_suggestion("recreate as a view");
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.category, "calculated-column");
        assert_eq!(issue.suggestion.as_deref(), Some("recreate as a view"));

        let err = IssueDraft::error(CATEGORY_CONFLICT, "exists");
        assert_eq!(err.severity, Severity::Error);
        assert!(err.suggestion.is_none());
    }
}
