use std::collections::HashMap;
use std::path::PathBuf;

use accessmig_core::config::ImportConfig;
use accessmig_core::naming::sanitize_identifier;
use accessmig_db::models::target_database::CreateTargetDatabase;
use accessmig_db::repositories::{ImportIssueRepo, ImportLogRepo, TargetDatabaseRepo};
use accessmig_pipeline::collaborators::{PayloadFile, PrecomputedConversion};
use accessmig_pipeline::{
    EngineSettings, ImportEngine, ImportError, QueryImportRequest, TableImportRequest,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about = "Materialize extracted legacy objects into PostgreSQL")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ObjectArgs {
    /// Target database id
    #[arg(long)]
    database_id: i64,

    /// Extractor output (JSON) for the object
    #[arg(long)]
    payload: PathBuf,

    /// Path of the legacy database file, recorded in the audit trail
    #[arg(long, default_value = "")]
    source_path: String,

    /// Legacy object name; defaults to the payload file stem
    #[arg(long)]
    object_name: Option<String>,

    /// Replace an existing object of the same name
    #[arg(long)]
    force: bool,
}

impl ObjectArgs {
    fn object_name(&self) -> String {
        self.object_name.clone().unwrap_or_else(|| {
            self.payload
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register a target database and its schema
    Register {
        /// Display name of the legacy application
        #[arg(long)]
        name: String,

        /// Target schema; derived from the name when omitted
        #[arg(long)]
        schema: Option<String>,

        #[arg(long)]
        source_path: Option<String>,
    },
    /// Import one table from its extractor payload
    Table(ObjectArgs),
    /// Import one query from its extractor payload and converter output
    Query {
        #[command(flatten)]
        object: ObjectArgs,

        /// Converter output (JSON) for the query
        #[arg(long)]
        conversion: PathBuf,

        /// Form control mapping, `Forms!Orders!CustomerID=customer_id`
        #[arg(long = "control", value_parser = parse_mapping)]
        controls: Vec<(String, String)>,
    },
    /// Show recent import attempts for a target database
    Logs {
        #[arg(long)]
        database_id: i64,

        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show recorded issues for a target database
    Issues {
        #[arg(long)]
        database_id: i64,

        /// Include issues already marked resolved
        #[arg(long)]
        all: bool,
    },
}

fn parse_mapping(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((control, column)) if !control.trim().is_empty() && !column.trim().is_empty() => {
            Ok((control.trim().to_string(), column.trim().to_string()))
        }
        _ => Err(format!("expected CONTROL=COLUMN, got '{raw}'")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the error envelope and exit non-zero.
fn fail(err: ImportError) -> ! {
    println!("{}", err.to_json());
    std::process::exit(if err.status_code() < 500 { 2 } else { 1 });
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accessmig_worker=debug,accessmig_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ImportConfig::from_env()?;

    let pool = accessmig_db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to the database")?;
    accessmig_db::health_check(&pool).await?;
    accessmig_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!(max_connections = config.max_connections, "Database ready");

    let engine = ImportEngine::new(pool.clone(), EngineSettings::from(&config));

    match cli.command {
        Commands::Register {
            name,
            schema,
            source_path,
        } => {
            let schema_name = schema.unwrap_or_else(|| sanitize_identifier(&name));
            let target = TargetDatabaseRepo::create(
                &pool,
                &CreateTargetDatabase {
                    name,
                    schema_name,
                    source_path,
                },
            )
            .await
            .context("Failed to register target database")?;
            tracing::info!(id = target.id, schema = %target.schema_name, "Target database registered");
            print_json(&target)?;
        }
        Commands::Table(args) => {
            let request = TableImportRequest {
                database_id: args.database_id,
                source_path: args.source_path.clone(),
                object_name: args.object_name(),
                force: args.force,
            };
            match engine
                .import_table(&request, &PayloadFile::new(&args.payload))
                .await
            {
                Ok(outcome) => print_json(&outcome)?,
                Err(err) => fail(err),
            }
        }
        Commands::Query {
            object,
            conversion,
            controls,
        } => {
            let converter = match PrecomputedConversion::from_file(&conversion).await {
                Ok(converter) => converter,
                Err(err) => fail(err.into()),
            };
            let request = QueryImportRequest {
                database_id: object.database_id,
                source_path: object.source_path.clone(),
                object_name: object.object_name(),
                control_mapping: controls.into_iter().collect::<HashMap<_, _>>(),
                force: object.force,
            };
            match engine
                .import_query(&request, &PayloadFile::new(&object.payload), &converter)
                .await
            {
                Ok(outcome) => print_json(&outcome)?,
                Err(err) => fail(err),
            }
        }
        Commands::Logs { database_id, limit } => {
            let logs = ImportLogRepo::list_by_database(&pool, database_id, limit, None).await?;
            print_json(&logs)?;
        }
        Commands::Issues { database_id, all } => {
            let issues = ImportIssueRepo::list_by_database(&pool, database_id, !all).await?;
            print_json(&issues)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_mapping_splits_on_equals() {
        assert_eq!(
            parse_mapping("Forms!Orders!CustomerID = customer_id").unwrap(),
            ("Forms!Orders!CustomerID".to_string(), "customer_id".to_string())
        );
        assert!(parse_mapping("Forms!Orders!CustomerID").is_err());
        assert!(parse_mapping("=x").is_err());
    }

    #[test]
    fn object_name_defaults_to_payload_stem() {
        let cli = Cli::parse_from([
            "accessmig-worker",
            "table",
            "--database-id",
            "3",
            "--payload",
            "/tmp/extract/Customers.json",
        ]);
        let Commands::Table(args) = cli.command else {
            panic!("expected table command");
        };
        assert_eq!(args.object_name(), "Customers");
        assert!(!args.force);
    }

    #[test]
    fn query_command_collects_controls() {
        let cli = Cli::parse_from([
            "accessmig-worker",
            "query",
            "--database-id",
            "3",
            "--payload",
            "q.json",
            "--conversion",
            "q.converted.json",
            "--control",
            "Forms!F!A=a",
            "--control",
            "Forms!F!B=b",
            "--force",
        ]);
        let Commands::Query {
            object, controls, ..
        } = cli.command
        else {
            panic!("expected query command");
        };
        assert!(object.force);
        assert_eq!(controls.len(), 2);
    }
}
