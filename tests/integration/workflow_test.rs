//! End-to-end workflow tests: scripted generator against a real SQLite file.

use super::common::{shop_db, shop_source};
use pretty_assertions::assert_eq;
use querymend::db::{DataSource, SourceRegistry, SqliteSource, Value};
use querymend::error::GeneratorError;
use querymend::llm::ScriptedGenerator;
use querymend::workflow::{
    run_query, Outcome, QueryRequest, WorkflowController, WorkflowSettings, COUNT_FALLBACK_SQL,
};
use std::sync::Arc;
use std::time::Duration;

fn settings() -> WorkflowSettings {
    WorkflowSettings {
        execution_timeout: Some(Duration::from_secs(5)),
        ..WorkflowSettings::default()
    }
}

#[tokio::test]
async fn test_debug_loop_repairs_bad_column() {
    let (_dir, source) = shop_source().await;
    let generator = ScriptedGenerator::new()
        .respond_sql("SELECT SUM(totl) AS revenue FROM orders")
        .respond_sql("SELECT SUM(total) AS revenue FROM orders");

    let state = WorkflowController::new(&generator, &source, settings())
        .run("What is the total revenue?", "Table: orders", 3, true)
        .await;

    assert_eq!(state.execution_count(), 2);
    assert_eq!(state.attempt_count(), 1);
    assert_eq!(
        state.outcome(),
        &Outcome::Succeeded {
            columns: vec!["revenue".to_string()],
            rows: vec![vec![Value::Float(37.75)]],
        }
    );

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("SELECT SUM(totl) AS revenue FROM orders"));
    assert!(prompts[1].contains("no such column"));
}

#[tokio::test]
async fn test_budget_exhaustion_executes_budget_plus_one_times() {
    let (_dir, source) = shop_source().await;
    let generator = ScriptedGenerator::always_sql("SELECT * FROM invoices");

    let state = WorkflowController::new(&generator, &source, settings())
        .run("show invoices", "Table: orders", 2, true)
        .await;

    assert_eq!(state.execution_count(), 3);
    assert_eq!(state.attempt_count(), 2);
    assert_eq!(generator.call_count(), 3);
    match state.outcome() {
        Outcome::Failed { message } => {
            assert!(message.starts_with("Failed to execute SQL after 3 attempts"));
            assert!(message.contains("no such table"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_debug_disabled_gives_up_after_one_execution() {
    let (_dir, source) = shop_source().await;
    let generator = ScriptedGenerator::always_sql("SELECT * FROM invoices");

    let state = WorkflowController::new(&generator, &source, settings())
        .run("show invoices", "Table: orders", 5, false)
        .await;

    assert_eq!(state.execution_count(), 1);
    assert_eq!(state.attempt_count(), 0);
    assert_eq!(generator.call_count(), 1);
    assert!(matches!(state.outcome(), Outcome::Failed { .. }));
}

#[tokio::test]
async fn test_offline_generator_falls_back_to_count_query() {
    let (_dir, source) = shop_source().await;
    let generator =
        ScriptedGenerator::always_failing(GeneratorError::Transport("connection refused".into()));

    let state = WorkflowController::new(&generator, &source, settings())
        .run("How many customers are there?", "Table: customers", 3, true)
        .await;

    assert_eq!(state.current_sql(), Some(COUNT_FALLBACK_SQL));
    assert_eq!(
        state.outcome(),
        &Outcome::Succeeded {
            columns: vec!["count".to_string()],
            rows: vec![vec![Value::Int(1)]],
        }
    );
}

#[tokio::test]
async fn test_unsafe_candidate_is_never_executed() {
    let (_dir, path) = shop_db().await;
    let mut registry = SourceRegistry::new();
    registry.register("shop", Arc::new(SqliteSource::new(path.clone())), "");
    let generator = ScriptedGenerator::always_sql("DELETE FROM customers");

    let report = run_query(
        &QueryRequest::new("list all customers", "shop"),
        &registry,
        &generator,
        &settings(),
    )
    .await;

    assert!(report.succeeded);
    assert_eq!(report.sql, "SELECT * FROM customers LIMIT 10");
    assert_eq!(report.rows.len(), 3);

    let remaining = registry
        .data_source("shop")
        .unwrap()
        .fetch_all("SELECT COUNT(*) AS n FROM customers")
        .await
        .unwrap();
    assert_eq!(remaining.rows, vec![vec![Value::Int(3)]]);
}

#[tokio::test]
async fn test_run_query_uses_introspected_schema() {
    let (_dir, path) = shop_db().await;
    let mut registry = SourceRegistry::new();
    registry.register("shop", Arc::new(SqliteSource::new(path.clone())), "");
    let generator = ScriptedGenerator::new().respond_sql(
        "SELECT city, COUNT(*) AS customers\nFROM customers\nWHERE city IS NOT NULL\nGROUP BY city\nORDER BY city",
    );

    let report = run_query(
        &QueryRequest::new("Customers per city", "shop").with_attempt_budget(0),
        &registry,
        &generator,
        &settings(),
    )
    .await;

    assert!(report.succeeded, "{:?}", report.error);
    assert_eq!(report.columns, vec!["city", "customers"]);
    assert_eq!(
        report.rows,
        vec![
            vec![Value::from("London"), Value::Int(1)],
            vec![Value::from("New York"), Value::Int(1)],
        ]
    );
    assert!(generator.prompts()[0].contains("  - customer_id (INTEGER, NOT NULL)"));
}

#[test]
fn test_run_query_unknown_source_outside_async_test() {
    let registry = SourceRegistry::new();
    let generator = ScriptedGenerator::new();

    let report = tokio_test::block_on(run_query(
        &QueryRequest::new("anything", "warehouse"),
        &registry,
        &generator,
        &WorkflowSettings::default(),
    ));

    assert!(!report.succeeded);
    assert_eq!(report.attempts, 0);
    assert_eq!(
        report.error.as_deref(),
        Some("Data source 'warehouse' not found")
    );
}
