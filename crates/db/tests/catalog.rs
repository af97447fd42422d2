//! Integration tests for the system catalog lookups.

use accessmig_core::ddl::RelationKind;
use accessmig_db::repositories::CatalogRepo;
use sqlx::PgPool;

async fn exec(pool: &PgPool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_relation_kind(pool: PgPool) {
    exec(&pool, "CREATE SCHEMA app").await;
    exec(&pool, "CREATE TABLE app.customers (id integer, name text)").await;
    exec(&pool, "CREATE VIEW app.customer_names AS SELECT name FROM app.customers").await;

    assert_eq!(
        CatalogRepo::relation_kind(&pool, "app", "customers").await.unwrap(),
        Some(RelationKind::Table)
    );
    assert_eq!(
        CatalogRepo::relation_kind(&pool, "app", "customer_names").await.unwrap(),
        Some(RelationKind::View)
    );
    assert_eq!(
        CatalogRepo::relation_kind(&pool, "app", "missing").await.unwrap(),
        None
    );
    assert_eq!(
        CatalogRepo::relation_kind(&pool, "public", "customers").await.unwrap(),
        None
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_function_signatures_cover_overloads(pool: PgPool) {
    exec(&pool, "CREATE SCHEMA app").await;
    exec(&pool, "CREATE FUNCTION app.f(a integer) RETURNS integer AS 'SELECT a' LANGUAGE sql").await;
    exec(&pool, "CREATE FUNCTION app.f(a text) RETURNS text AS 'SELECT a' LANGUAGE sql").await;

    let sigs = CatalogRepo::function_signatures(&pool, "app", "f").await.unwrap();
    assert_eq!(sigs.len(), 2);
    assert!(sigs.iter().any(|s| s == "app.f(integer)"));
    assert!(sigs.iter().any(|s| s == "app.f(text)"));
    assert!(CatalogRepo::function_signatures(&pool, "app", "g")
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_column_types_and_counts(pool: PgPool) {
    exec(&pool, "CREATE SCHEMA app").await;
    exec(&pool, "CREATE TABLE app.orders (id bigint, placed timestamp, total numeric(19,4))").await;
    exec(&pool, "INSERT INTO app.orders (id) VALUES (1), (2)").await;

    let types = CatalogRepo::column_types(&pool, "app").await.unwrap();
    let orders = &types["orders"];
    assert_eq!(orders["id"], "bigint");
    assert_eq!(orders["placed"], "timestamp without time zone");
    assert_eq!(orders["total"], "numeric");

    assert_eq!(CatalogRepo::count_rows(&pool, "app", "orders").await.unwrap(), 2);
}
