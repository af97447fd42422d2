//! One import attempt: its phase, its accumulated issues, and the audit
//! rows written once it resolves.

use accessmig_core::error::CoreError;
use accessmig_core::issues::{ImportStatus, IssueDraft, Severity, SourceObjectType};
use accessmig_core::phase::ImportPhase;
use accessmig_core::types::DbId;
use accessmig_db::models::import_issue::CreateImportIssue;
use accessmig_db::models::import_log::CreateImportLog;
use accessmig_db::repositories::{ImportIssueRepo, ImportLogRepo};
use sqlx::PgPool;

use crate::error::{ImportError, ImportResult};

#[derive(Debug)]
pub struct ImportSession {
    phase: ImportPhase,
    source_path: String,
    object_name: String,
    object_type: SourceObjectType,
    database_id: Option<DbId>,
    issues: Vec<IssueDraft>,
}

impl ImportSession {
    pub fn new(source_path: &str, object_name: &str, object_type: SourceObjectType) -> Self {
        Self {
            phase: ImportPhase::Requested,
            source_path: source_path.to_string(),
            object_name: object_name.to_string(),
            object_type,
            database_id: None,
            issues: Vec::new(),
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    pub fn issues(&self) -> &[IssueDraft] {
        &self.issues
    }

    /// Attach the resolved target database to the audit entry.
    pub fn set_database(&mut self, id: DbId) {
        self.database_id = Some(id);
    }

    pub fn advance(&mut self, next: ImportPhase) -> ImportResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(CoreError::Internal(format!(
                "Illegal import phase transition {} -> {next}",
                self.phase
            ))
            .into());
        }
        tracing::debug!(
            object = %self.object_name,
            from = %self.phase,
            to = %next,
            "Import phase transition"
        );
        self.phase = next;
        Ok(())
    }

    /// Move to the terminal failure phase appropriate to the current one.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            let next = self.phase.failure_phase();
            tracing::debug!(object = %self.object_name, from = %self.phase, to = %next, "Import failed");
            self.phase = next;
        }
    }

    /// Record a deviation that does not fail the import.
    pub fn record(&mut self, issue: IssueDraft) {
        if issue.severity == Severity::Warning {
            tracing::warn!(
                object = %self.object_name,
                category = issue.category,
                message = %issue.message,
                "Import deviation"
            );
        }
        self.issues.push(issue);
    }

    pub fn record_all(&mut self, issues: impl IntoIterator<Item = IssueDraft>) {
        for issue in issues {
            self.record(issue);
        }
    }

    /// Write the success audit entry and its warnings.
    ///
    /// Audit failures are logged and swallowed: the import itself has
    /// already committed.
    pub async fn finish_success(&self, pool: &PgPool, result: serde_json::Value) -> Option<DbId> {
        let details = serde_json::json!({
            "phase": self.phase.as_str(),
            "result": result,
            "warningCount": self.issues.len(),
        });
        self.write_audit(pool, ImportStatus::Success, None, details, &self.issues)
            .await
    }

    /// Write the error audit entry with one error issue.
    pub async fn finish_failure(&self, pool: &PgPool, error: &ImportError) -> Option<DbId> {
        let mut details = serde_json::json!({
            "phase": self.phase.as_str(),
            "errorKind": error.kind().as_str(),
            "code": error.code(),
        });
        if let Some(statement) = error.failed_statement() {
            details["statement"] = serde_json::Value::String(statement.to_string());
        }
        let issues = [error.to_issue()];
        self.write_audit(pool, ImportStatus::Error, Some(error.to_string()), details, &issues)
            .await
    }

    async fn write_audit(
        &self,
        pool: &PgPool,
        status: ImportStatus,
        error_message: Option<String>,
        details: serde_json::Value,
        issues: &[IssueDraft],
    ) -> Option<DbId> {
        match self.insert_audit(pool, status, error_message, details, issues).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, object = %self.object_name, "Failed to write import log");
                None
            }
        }
    }

    /// Insert the log row and its issues in one transaction.
    async fn insert_audit(
        &self,
        pool: &PgPool,
        status: ImportStatus,
        error_message: Option<String>,
        details: serde_json::Value,
        issues: &[IssueDraft],
    ) -> Result<DbId, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let log = ImportLogRepo::create(
            &mut *tx,
            &CreateImportLog {
                source_path: self.source_path.clone(),
                source_object_name: self.object_name.clone(),
                source_object_type: self.object_type,
                target_database_id: self.database_id,
                status,
                error_message,
                details: Some(details),
            },
        )
        .await?;

        let inputs: Vec<CreateImportIssue> = issues
            .iter()
            .map(|draft| {
                CreateImportIssue::from_draft(
                    draft,
                    Some(log.id),
                    self.database_id,
                    &self.object_name,
                    self.object_type,
                )
            })
            .collect();
        ImportIssueRepo::insert_all(&mut *tx, &inputs).await?;

        tx.commit().await?;
        Ok(log.id)
    }
}
