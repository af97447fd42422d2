//! The import engine: drives one table or query import from extraction
//! through commit, then records the audit trail.

use std::collections::HashMap;

use accessmig_core::column_plan::build_table_plan;
use accessmig_core::config::ImportConfig;
use accessmig_core::conversion::ConversionRequest;
use accessmig_core::ddl::DEFAULT_BATCH_SIZE;
use accessmig_core::error::CoreError;
use accessmig_core::extraction::{parse_query_payload, parse_table_payload};
use accessmig_core::issues::{IssueDraft, SourceObjectType, CATEGORY_CONVERSION_WARNING};
use accessmig_core::phase::ImportPhase;
use accessmig_core::types::DbId;
use accessmig_db::models::target_database::TargetDatabase;
use accessmig_db::repositories::{CatalogRepo, TargetDatabaseRepo};
use sqlx::{PgConnection, PgPool};

use crate::collaborators::{Extractor, QueryConverter};
use crate::error::{ImportError, ImportResult};
use crate::loader::load_rows;
use crate::materializer::{materialize_table, prepare_namespace};
use crate::query::materialize_query;
use crate::reconciler::reconcile;
use crate::results::{ImportOutcome, QueryImportResult, TableImportResult};
use crate::session::ImportSession;

/// Engine tuning, taken from [`ImportConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub batch_size: usize,
    pub lock_namespace: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lock_namespace: true,
        }
    }
}

impl From<&ImportConfig> for EngineSettings {
    fn from(config: &ImportConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            lock_namespace: config.lock_namespace,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableImportRequest {
    pub database_id: DbId,
    pub source_path: String,
    pub object_name: String,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct QueryImportRequest {
    pub database_id: DbId,
    pub source_path: String,
    pub object_name: String,
    /// Form control name -> column name, passed through to the converter.
    pub control_mapping: HashMap<String, String>,
    pub force: bool,
}

#[derive(Clone)]
pub struct ImportEngine {
    pool: PgPool,
    settings: EngineSettings,
}

impl ImportEngine {
    pub fn new(pool: PgPool, settings: EngineSettings) -> Self {
        Self { pool, settings }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn resolve_target(
        &self,
        session: &mut ImportSession,
        database_id: DbId,
    ) -> ImportResult<TargetDatabase> {
        let target = TargetDatabaseRepo::find_by_id(&self.pool, database_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "target_database",
                id: database_id,
            })?;
        session.set_database(target.id);
        Ok(target)
    }

    /// Import one legacy table: plan, create, load, reconcile, commit.
    pub async fn import_table(
        &self,
        request: &TableImportRequest,
        extractor: &dyn Extractor,
    ) -> ImportResult<ImportOutcome<TableImportResult>> {
        let mut session = ImportSession::new(
            &request.source_path,
            &request.object_name,
            SourceObjectType::Table,
        );
        tracing::info!(
            database_id = request.database_id,
            object = %request.object_name,
            force = request.force,
            "Table import requested"
        );

        match self.run_table(&mut session, request, extractor).await {
            Ok(result) => {
                let json = serde_json::to_value(&result).unwrap_or_default();
                let import_log_id = session.finish_success(&self.pool, json).await;
                Ok(ImportOutcome {
                    result,
                    import_log_id,
                })
            }
            Err(err) => {
                session.fail();
                tracing::error!(
                    error = %err,
                    phase = %session.phase(),
                    object = %request.object_name,
                    source_path = %request.source_path,
                    statement = err.failed_statement().unwrap_or(""),
                    "Table import failed"
                );
                session.finish_failure(&self.pool, &err).await;
                Err(err)
            }
        }
    }

    async fn run_table(
        &self,
        session: &mut ImportSession,
        request: &TableImportRequest,
        extractor: &dyn Extractor,
    ) -> ImportResult<TableImportResult> {
        session.advance(ImportPhase::Validating)?;
        let target = self.resolve_target(session, request.database_id).await?;

        let output = extractor
            .extract(
                &request.source_path,
                &request.object_name,
                SourceObjectType::Table,
            )
            .await?;
        let payload = parse_table_payload(&output)?;
        let mut plan = build_table_plan(&request.object_name, &payload)?;
        session.record_all(plan.issues.drain(..));

        session.advance(ImportPhase::Materializing)?;
        let mut tx = self.pool.begin().await?;

        let loaded = async {
            let conn: &mut PgConnection = &mut tx;
            prepare_namespace(conn, &target.schema_name, self.settings.lock_namespace).await?;
            materialize_table(conn, &target.schema_name, &mut plan, request.force).await?;

            session.advance(ImportPhase::Loading)?;
            let loaded = load_rows(
                conn,
                &target.schema_name,
                &plan,
                &payload.rows,
                self.settings.batch_size,
            )
            .await?;

            session.advance(ImportPhase::Reconciling)?;
            reconcile(conn, &target.schema_name, &plan, loaded).await?;
            Ok::<_, ImportError>(loaded)
        }
        .await;

        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed; connection discarded");
                }
                return Err(err);
            }
        };

        tx.commit().await?;
        session.advance(ImportPhase::Committed)?;

        // Warnings raised while creating the table (degraded generated columns, dropped defaults).
        session.record_all(plan.issues.drain(..));

        let calculated_warnings = session
            .issues()
            .iter()
            .filter(|i| i.category == accessmig_core::issues::CATEGORY_CALCULATED_COLUMN)
            .map(|i| i.message.clone())
            .collect();

        tracing::info!(
            schema = %target.schema_name,
            table = %plan.table_name,
            rows = loaded,
            warnings = session.issues().len(),
            "Table import committed"
        );

        Ok(TableImportResult {
            success: true,
            table_name: plan.table_name.clone(),
            field_count: plan.columns.len(),
            row_count: loaded,
            calculated_columns: plan.calculated_columns(),
            skipped_columns: plan.skipped_columns,
            calculated_warnings,
        })
    }

    /// Import one legacy query as a view or function.
    pub async fn import_query(
        &self,
        request: &QueryImportRequest,
        extractor: &dyn Extractor,
        converter: &dyn QueryConverter,
    ) -> ImportResult<ImportOutcome<QueryImportResult>> {
        let mut session = ImportSession::new(
            &request.source_path,
            &request.object_name,
            SourceObjectType::Query,
        );
        tracing::info!(
            database_id = request.database_id,
            object = %request.object_name,
            force = request.force,
            "Query import requested"
        );

        match self.run_query(&mut session, request, extractor, converter).await {
            Ok(result) => {
                let json = serde_json::to_value(&result).unwrap_or_default();
                let import_log_id = session.finish_success(&self.pool, json).await;
                Ok(ImportOutcome {
                    result,
                    import_log_id,
                })
            }
            Err(err) => {
                session.fail();
                tracing::error!(
                    error = %err,
                    phase = %session.phase(),
                    object = %request.object_name,
                    "Query import failed"
                );
                session.finish_failure(&self.pool, &err).await;
                Err(err)
            }
        }
    }

    async fn run_query(
        &self,
        session: &mut ImportSession,
        request: &QueryImportRequest,
        extractor: &dyn Extractor,
        converter: &dyn QueryConverter,
    ) -> ImportResult<QueryImportResult> {
        session.advance(ImportPhase::Validating)?;
        let target = self.resolve_target(session, request.database_id).await?;

        let output = extractor
            .extract(
                &request.source_path,
                &request.object_name,
                SourceObjectType::Query,
            )
            .await?;
        let query = parse_query_payload(&output)?;

        let column_types = CatalogRepo::column_types(&self.pool, &target.schema_name).await?;
        let conversion = ConversionRequest {
            query_name: request.object_name.clone(),
            query: query.clone(),
            schema_name: target.schema_name.clone(),
            column_types,
            control_mapping: request.control_mapping.clone(),
        };
        let converted = converter.convert(&conversion).await?;
        converted.validate()?;

        let mut warnings = converted.warnings.clone();
        if let Some(param_warning) = &query.param_warning {
            warnings.push(param_warning.clone());
        }
        session.record_all(
            warnings
                .iter()
                .map(|w| IssueDraft::warning(CATEGORY_CONVERSION_WARNING, w.clone())),
        );

        session.advance(ImportPhase::Materializing)?;
        let mut tx = self.pool.begin().await?;

        let executed = async {
            let conn: &mut PgConnection = &mut tx;
            prepare_namespace(conn, &target.schema_name, self.settings.lock_namespace).await?;
            materialize_query(conn, &target.schema_name, &converted, &query.sql, request.force).await
        }
        .await;

        if let Err(err) = executed {
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed; connection discarded");
            }
            return Err(err);
        }

        tx.commit().await?;
        session.advance(ImportPhase::Committed)?;

        tracing::info!(
            schema = %target.schema_name,
            object = %converted.pg_object_name,
            kind = %converted.pg_object_type,
            "Query import committed"
        );

        Ok(QueryImportResult {
            success: true,
            query_name: converted.pg_object_name.clone(),
            pg_object_type: converted.pg_object_type.as_str().to_string(),
            warnings,
            original_type: query.query_type.clone(),
            extracted_functions: converted
                .extracted_functions
                .iter()
                .map(|f| f.name.clone())
                .collect(),
        })
    }
}
