use accessmig_core::error::CoreError;
use accessmig_core::issues::{
    IssueDraft, CATEGORY_CONFLICT, CATEGORY_IMPORT_FAILED, CATEGORY_INVALID_PAYLOAD,
};
use serde_json::json;

/// PostgreSQL error codes raised when an object already exists.
const DUPLICATE_CODES: &[&str] = &[
    "23505", // unique_violation
    "42P07", // duplicate_table
    "42723", // duplicate_function
    "42710", // duplicate_object
];

/// Failure of one import attempt.
///
/// Wraps [`CoreError`] for domain errors and adds store-level variants.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A domain-level error from `accessmig_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error outside any generated statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A generated DDL or DML statement was rejected by the store.
    #[error("Statement failed: {source}")]
    Statement {
        statement: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Convenience alias for engine return values.
pub type ImportResult<T> = Result<T, ImportError>;

/// Coarse classification of a failed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any store mutation.
    Input,
    /// The target object already exists.
    Conflict,
    /// A statement failed inside the import transaction.
    Transactional,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Conflict => "conflict",
            Self::Transactional => "transactional",
        }
    }
}

fn is_duplicate(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| DUPLICATE_CODES.iter().any(|c| code == *c))
}

impl ImportError {
    pub fn statement(statement: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Statement {
            statement: statement.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(core) => match core {
                CoreError::NotFound { .. } | CoreError::Validation(_) | CoreError::Extraction(_) => {
                    ErrorKind::Input
                }
                CoreError::Conflict(_) => ErrorKind::Conflict,
                CoreError::Internal(_) => ErrorKind::Transactional,
            },
            Self::Database(err) | Self::Statement { source: err, .. } => {
                if is_duplicate(err) {
                    ErrorKind::Conflict
                } else {
                    ErrorKind::Transactional
                }
            }
        }
    }

    /// HTTP-equivalent status for the surrounding product.
    pub fn status_code(&self) -> u16 {
        if let Self::Core(CoreError::NotFound { .. }) = self {
            return 404;
        }
        match self.kind() {
            ErrorKind::Input => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Transactional => 500,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(CoreError::NotFound { .. }) => "NOT_FOUND",
            Self::Core(CoreError::Extraction(_)) => "INVALID_PAYLOAD",
            Self::Core(CoreError::Validation(_)) => "VALIDATION_ERROR",
            _ => match self.kind() {
                ErrorKind::Conflict => "CONFLICT",
                _ => "INTERNAL_ERROR",
            },
        }
    }

    /// The failing statement, if a generated statement caused the failure.
    pub fn failed_statement(&self) -> Option<&str> {
        match self {
            Self::Statement { statement, .. } => Some(statement),
            _ => None,
        }
    }

    /// Error-severity issue describing this failure for the audit trail.
    pub fn to_issue(&self) -> IssueDraft {
        let message = self.to_string();
        match (self, self.kind()) {
            (Self::Core(CoreError::Extraction(_)), _) => {
                IssueDraft::error(CATEGORY_INVALID_PAYLOAD, message)
                    .with_suggestion("Re-run extraction and check the source object still exists")
            }
            (_, ErrorKind::Conflict) => IssueDraft::error(CATEGORY_CONFLICT, message)
                .with_suggestion("Re-import with force to replace the existing object"),
            (_, ErrorKind::Input) => IssueDraft::error(CATEGORY_IMPORT_FAILED, message)
                .with_suggestion("Correct the request or the source object and retry"),
            (_, ErrorKind::Transactional) => IssueDraft::error(CATEGORY_IMPORT_FAILED, message)
                .with_suggestion("Inspect the failing statement in the logs; nothing was changed"),
        }
    }

    /// JSON error envelope for callers.
    pub fn to_json(&self) -> serde_json::Value {
        let message = match self.kind() {
            ErrorKind::Transactional => match self {
                Self::Core(CoreError::Internal(msg)) => msg.clone(),
                _ => self.to_string(),
            },
            _ => self.to_string(),
        };
        json!({
            "error": message,
            "code": self.code(),
            "kind": self.kind().as_str(),
        })
    }
}
