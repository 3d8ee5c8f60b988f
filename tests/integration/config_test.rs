//! Config file to answered question, wired the way the binary does it.

use super::common::shop_db;
use querymend::config::Config;
use querymend::db::{SourceRegistry, Value};
use querymend::llm::create_generator;
use querymend::output::{render_report, OutputFormat};
use querymend::workflow::{run_query, QueryRequest, WorkflowSettings};
use std::fs;

#[tokio::test]
async fn test_config_file_drives_a_full_query() {
    let (dir, db_path) = shop_db().await;
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            r#"
active_source = "shop"

[llm]
provider = "mock"

[workflow]
attempt_budget = 1
execution_timeout_secs = 5

[sources.shop]
backend = "sqlite"
url = "sqlite://{}"
description = "Shop export"
"#,
            db_path.display()
        ),
    )
    .unwrap();

    let config = Config::load_from_file(&config_path).unwrap();
    let registry = SourceRegistry::from_config(&config);
    let settings = WorkflowSettings::from_config(&config);
    let generator = create_generator(&config.llm).unwrap();

    let sources = registry.list();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].active);
    assert_eq!(sources[0].description, "Shop export");

    let name = config.resolve_source_name(None).unwrap();
    let request = QueryRequest::new("anything", name)
        .with_attempt_budget(config.workflow.attempt_budget);
    let report = run_query(&request, &registry, generator.as_ref(), &settings).await;

    assert!(report.succeeded, "{:?}", report.error);
    assert_eq!(report.rows, vec![vec![Value::Int(1)]]);
    assert_eq!(
        render_report(&report, OutputFormat::Text).unwrap(),
        "SQL: SELECT 1 AS result\n\nresult\n──────\n1"
    );
}

#[test]
fn test_unknown_active_source_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        "active_source = \"missing\"\n\n[sources.shop]\nurl = \"shop.db\"\n",
    )
    .unwrap();

    let err = Config::load_from_file(&config_path).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("config.toml"), "{message}");
    assert!(message.contains("active_source 'missing'"), "{message}");
}
