//! SQLite data source integration tests.
//!
//! Exercises execution, introspection and the schema cache against real files.

use super::common::{shop_db, shop_source};
use pretty_assertions::assert_eq;
use querymend::db::{DataSource, SchemaProvider, SourceRegistry, SqliteSource, Value};
use querymend::query::{ExecutionResult, QueryExecutor};
use std::sync::Arc;

#[tokio::test]
async fn test_schema_text_lists_tables_in_creation_order() {
    let (_dir, source) = shop_source().await;
    let schema = source.introspect_schema().await.unwrap();

    assert_eq!(
        schema.format_schema_text(),
        "Table: customers\n  - id (INTEGER, NULL)\n  - name (TEXT, NOT NULL)\n  - city (TEXT, NULL)\n\n\
         Table: orders\n  - id (INTEGER, NULL)\n  - customer_id (INTEGER, NOT NULL)\n  - total (REAL, NOT NULL)"
    );
}

#[tokio::test]
async fn test_executor_runs_aggregate_query() {
    let (_dir, source) = shop_source().await;
    let executor = QueryExecutor::new(&source);

    let result = executor
        .execute("SELECT c.name, SUM(o.total) AS spent FROM customers c JOIN orders o ON o.customer_id = c.id GROUP BY c.name ORDER BY c.name")
        .await;

    assert_eq!(
        result,
        ExecutionResult::Success {
            columns: vec!["name".to_string(), "spent".to_string()],
            rows: vec![
                vec![Value::from("Ada"), Value::Float(30.5)],
                vec![Value::from("Grace"), Value::Float(7.25)],
            ],
            rows_affected: 0,
        }
    );
}

#[tokio::test]
async fn test_executor_reports_backend_error_as_failure() {
    let (_dir, source) = shop_source().await;
    let executor = QueryExecutor::new(&source);

    match executor.execute("SELECT * FROM invoices").await {
        ExecutionResult::Failure { message } => assert!(message.contains("no such table")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_executor_runs_write_statement() {
    let (_dir, source) = shop_source().await;
    let executor = QueryExecutor::new(&source);

    let result = executor
        .execute("DELETE FROM orders WHERE customer_id = 1")
        .await;

    assert_eq!(
        result,
        ExecutionResult::Success {
            columns: vec![],
            rows: vec![],
            rows_affected: 2,
        }
    );
}

#[tokio::test]
async fn test_null_values_round_trip() {
    let (_dir, source) = shop_source().await;
    let result = source
        .fetch_all("SELECT city FROM customers WHERE name = 'Linus'")
        .await
        .unwrap();
    assert_eq!(result.rows, vec![vec![Value::Null]]);
}

#[tokio::test]
async fn test_registry_caches_schema_until_invalidated() {
    let (_dir, path) = shop_db().await;
    let mut registry = SourceRegistry::new();
    registry.register("shop", Arc::new(SqliteSource::new(path.clone())), "Shop export");

    let first = registry.get_schema("shop").await.unwrap();
    assert!(first.contains("Table: orders"));

    registry
        .data_source("shop")
        .unwrap()
        .execute("CREATE TABLE refunds (id INTEGER, amount REAL)")
        .await
        .unwrap();

    assert_eq!(registry.get_schema("shop").await.unwrap(), first);

    registry.invalidate_schema("shop");
    let refreshed = registry.get_schema("shop").await.unwrap();
    assert!(refreshed.ends_with("Table: refunds\n  - id (INTEGER, NULL)\n  - amount (REAL, NULL)"));
}

#[tokio::test]
async fn test_registry_missing_file_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = SourceRegistry::new();
    registry.register(
        "gone",
        Arc::new(SqliteSource::new(dir.path().join("gone.db"))),
        "",
    );

    let err = registry.get_schema("gone").await.unwrap_err();
    assert_eq!(err.category(), "Connection Error");
}
