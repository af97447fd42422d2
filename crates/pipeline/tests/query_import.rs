//! End-to-end query imports: views, functions, and forced replacement.

mod common;

use std::collections::HashMap;

use accessmig_core::conversion::{ConvertedQuery, ExtractedFunction, TargetObjectKind};
use accessmig_pipeline::collaborators::{CapturedExtraction, PrecomputedConversion};
use accessmig_pipeline::{ErrorKind, QueryImportRequest};
use common::*;
use serde_json::json;
use sqlx::PgPool;

fn query_request(database_id: i64, object_name: &str, force: bool) -> QueryImportRequest {
    QueryImportRequest {
        database_id,
        source_path: SOURCE.to_string(),
        object_name: object_name.to_string(),
        control_mapping: HashMap::new(),
        force,
    }
}

fn select_query(param_warning: Option<&str>) -> CapturedExtraction {
    let mut payload = json!({
        "sql": "SELECT CustomerID, Name FROM Customers WHERE Active = True;",
        "queryType": "Select"
    });
    if let Some(warning) = param_warning {
        payload["paramWarning"] = json!(warning);
    }
    CapturedExtraction::new(payload.to_string())
}

fn converted(name: &str, kind: TargetObjectKind, statements: &[&str]) -> PrecomputedConversion {
    PrecomputedConversion::new(ConvertedQuery {
        statements: statements.iter().map(|s| s.to_string()).collect(),
        pg_object_name: name.to_string(),
        pg_object_type: kind,
        warnings: Vec::new(),
        extracted_functions: Vec::new(),
    })
}

async fn seed_customers(pool: &PgPool) {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS northwind")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE northwind.customers (customerid integer PRIMARY KEY, name text, active boolean)",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO northwind.customers VALUES (1, 'Acme', true), (2, 'Globex', false)",
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn relation_exists(pool: &PgPool, name: &str) -> bool {
    let (exists,): (bool,) = sqlx::query_as(
        "SELECT EXISTS (
            SELECT 1 FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2
         )",
    )
    .bind(SCHEMA)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    exists
}

async fn function_count(pool: &PgPool, name: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace
         WHERE n.nspname = $1 AND p.proname = $2",
    )
    .bind(SCHEMA)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    count
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_select_query_becomes_view(pool: PgPool) {
    let db = target_database(&pool).await;
    seed_customers(&pool).await;

    let mut conversion = ConvertedQuery {
        statements: vec![
            "-- converted from Access".to_string(),
            "CREATE VIEW active_customers AS SELECT customerid, name FROM customers WHERE active = true"
                .to_string(),
        ],
        pg_object_name: "active_customers".to_string(),
        pg_object_type: TargetObjectKind::View,
        warnings: vec!["Boolean literal True rewritten".to_string()],
        extracted_functions: Vec::new(),
    };
    conversion.extracted_functions.push(ExtractedFunction {
        name: "fn_helper".to_string(),
    });

    let outcome = engine(&pool)
        .import_query(
            &query_request(db, "Active Customers", false),
            &select_query(Some("Parameter [Start] type is ambiguous")),
            &PrecomputedConversion::new(conversion),
        )
        .await
        .unwrap();

    let result = &outcome.result;
    assert!(result.success);
    assert_eq!(result.query_name, "active_customers");
    assert_eq!(result.pg_object_type, "view");
    assert_eq!(result.original_type, "Select");
    assert_eq!(result.extracted_functions, vec!["fn_helper"]);
    assert_eq!(
        result.warnings,
        vec![
            "Boolean literal True rewritten".to_string(),
            "Parameter [Start] type is ambiguous".to_string(),
        ]
    );

    let names: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM northwind.active_customers ORDER BY customerid")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(names, vec![("Acme".to_string(),)]);

    let (status, details, issues) = latest_log(&pool).await;
    assert_eq!(status, "success");
    assert_eq!(details["result"]["pgObjectType"], "view");
    assert_eq!(
        issues,
        vec![
            ("warning".to_string(), "conversion-warning".to_string()),
            ("warning".to_string(), "conversion-warning".to_string()),
        ]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_existing_view_conflicts_then_force_replaces(pool: PgPool) {
    let db = target_database(&pool).await;
    seed_customers(&pool).await;
    let engine = engine(&pool);

    let first = converted(
        "customer_names",
        TargetObjectKind::View,
        &["CREATE VIEW customer_names AS SELECT name FROM customers"],
    );
    engine
        .import_query(&query_request(db, "Customer Names", false), &select_query(None), &first)
        .await
        .unwrap();

    let second = converted(
        "customer_names",
        TargetObjectKind::View,
        &["CREATE VIEW customer_names AS SELECT upper(name) AS name FROM customers"],
    );
    let err = engine
        .import_query(&query_request(db, "Customer Names", false), &select_query(None), &second)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let (status, _, issues) = latest_log(&pool).await;
    assert_eq!(status, "error");
    assert_eq!(issues, vec![("error".to_string(), "conflict".to_string())]);

    engine
        .import_query(&query_request(db, "Customer Names", true), &select_query(None), &second)
        .await
        .unwrap();

    let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM northwind.customer_names ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(names, vec![("ACME".to_string(),), ("GLOBEX".to_string(),)]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_forced_view_never_replaces_a_table(pool: PgPool) {
    let db = target_database(&pool).await;
    seed_customers(&pool).await;
    sqlx::query("CREATE TABLE northwind.summary (n integer)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO northwind.summary VALUES (7)")
        .execute(&pool)
        .await
        .unwrap();

    let err = engine(&pool)
        .import_query(
            &query_request(db, "Summary", true),
            &select_query(None),
            &converted(
                "summary",
                TargetObjectKind::View,
                &["CREATE VIEW summary AS SELECT COUNT(*) AS n FROM customers"],
            ),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let (relkind,): (String,) = sqlx::query_as(
        "SELECT relkind::text FROM pg_class WHERE oid = 'northwind.summary'::regclass",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(relkind, "r");
    let (n,): (i32,) = sqlx::query_as("SELECT n FROM northwind.summary")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(n, 7);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_view_helper_functions_resolve_schema_tables(pool: PgPool) {
    let db = target_database(&pool).await;
    seed_customers(&pool).await;

    let conversion = PrecomputedConversion::new(ConvertedQuery {
        statements: vec![
            "CREATE FUNCTION fn_customer_count() RETURNS bigint LANGUAGE sql STABLE AS $$ SELECT COUNT(*) FROM customers $$"
                .to_string(),
            "CREATE VIEW customer_stats AS SELECT fn_customer_count() AS total".to_string(),
        ],
        pg_object_name: "customer_stats".to_string(),
        pg_object_type: TargetObjectKind::View,
        warnings: Vec::new(),
        extracted_functions: vec![ExtractedFunction {
            name: "fn_customer_count".to_string(),
        }],
    });

    engine(&pool)
        .import_query(&query_request(db, "Customer Stats", false), &select_query(None), &conversion)
        .await
        .unwrap();

    let (total,): (i64,) = sqlx::query_as("SELECT total FROM northwind.customer_stats")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 2);
    let (direct,): (i64,) = sqlx::query_as("SELECT northwind.fn_customer_count()")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(direct, 2);
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_forced_function_drops_every_overload(pool: PgPool) {
    let db = target_database(&pool).await;
    seed_customers(&pool).await;
    for ddl in [
        "CREATE FUNCTION northwind.customer_name(p_id integer) RETURNS text LANGUAGE sql AS $$ SELECT 'old' $$",
        "CREATE FUNCTION northwind.customer_name(p_id integer, p_upper boolean) RETURNS text LANGUAGE sql AS $$ SELECT 'old' $$",
    ] {
        sqlx::query(ddl).execute(&pool).await.unwrap();
    }
    assert_eq!(function_count(&pool, "customer_name").await, 2);

    let conversion = converted(
        "customer_name",
        TargetObjectKind::Function,
        &["CREATE FUNCTION customer_name(p_id integer) RETURNS text LANGUAGE sql STABLE AS $$ SELECT name FROM customers WHERE customerid = p_id $$"],
    );

    let err = engine(&pool)
        .import_query(&query_request(db, "CustomerName", false), &select_query(None), &conversion)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let outcome = engine(&pool)
        .import_query(&query_request(db, "CustomerName", true), &select_query(None), &conversion)
        .await
        .unwrap();
    assert_eq!(outcome.result.pg_object_type, "function");
    assert_eq!(function_count(&pool, "customer_name").await, 1);

    let (name,): (String,) = sqlx::query_as("SELECT northwind.customer_name(2)")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "Globex");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_failing_statement_rolls_back_all_statements(pool: PgPool) {
    let db = target_database(&pool).await;
    seed_customers(&pool).await;

    let conversion = converted(
        "order_totals",
        TargetObjectKind::View,
        &[
            "CREATE FUNCTION fn_order_total(p integer) RETURNS integer LANGUAGE sql IMMUTABLE AS $$ SELECT p $$",
            "CREATE VIEW order_totals AS SELECT fn_order_total(customerid) AS total FROM no_such_table",
        ],
    );

    let err = engine(&pool)
        .import_query(&query_request(db, "Order Totals", false), &select_query(None), &conversion)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transactional);
    assert!(err.failed_statement().unwrap().contains("no_such_table"));

    assert!(!relation_exists(&pool, "order_totals").await);
    assert_eq!(function_count(&pool, "fn_order_total").await, 0);

    let (status, details, issues) = latest_log(&pool).await;
    assert_eq!(status, "error");
    assert_eq!(details["phase"], "rolled_back");
    assert_eq!(issues, vec![("error".to_string(), "import-failed".to_string())]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_conversion_without_statements_is_rejected(pool: PgPool) {
    let db = target_database(&pool).await;

    let err = engine(&pool)
        .import_query(
            &query_request(db, "Nothing", false),
            &select_query(None),
            &converted("nothing", TargetObjectKind::View, &[]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);

    let (status, details, _) = latest_log(&pool).await;
    assert_eq!(status, "error");
    assert_eq!(details["phase"], "rejected");

    let (schemas,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pg_namespace WHERE nspname = 'northwind'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(schemas, 0, "nothing runs before validation passes");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_table_payload_is_not_a_query(pool: PgPool) {
    let db = target_database(&pool).await;
    let err = engine(&pool)
        .import_query(
            &query_request(db, "Customers", false),
            &CapturedExtraction::new(r#"{"fields": [{"name": "ID", "type": 4}]}"#),
            &converted("customers", TargetObjectKind::View, &["SELECT 1"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_PAYLOAD");
}
