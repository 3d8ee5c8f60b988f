//! Natural-language query workflow.
//!
//! Turns a question into a validated SQL statement, runs it and repairs it
//! through a bounded debug loop when execution fails.

mod controller;
mod debug;
mod generate;
mod state;

pub use controller::{Phase, WorkflowController, WorkflowSettings};
pub use debug::{debug_sql, DEBUG_FALLBACK_SQL};
pub use generate::{fallback_sql, generate_sql, CONSTANT_FALLBACK_SQL, COUNT_FALLBACK_SQL};
pub use state::{Outcome, WorkflowState};

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{Row, SchemaProvider, SourceRegistry};
use crate::llm::TextGenerator;
use crate::query::{ExecutionResult, QueryExecutor};
use crate::safety::check_sql;

/// Default number of debug attempts per run.
pub const DEFAULT_ATTEMPT_BUDGET: u32 = 3;

/// One question to answer against one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub question: String,
    pub source_id: String,
    pub attempt_budget: u32,
    pub debug_enabled: bool,
}

impl QueryRequest {
    /// Creates a request with the default budget and debugging enabled.
    pub fn new(question: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            source_id: source_id.into(),
            attempt_budget: DEFAULT_ATTEMPT_BUDGET,
            debug_enabled: true,
        }
    }

    pub fn with_attempt_budget(mut self, attempt_budget: u32) -> Self {
        self.attempt_budget = attempt_budget;
        self
    }

    pub fn with_debug(mut self, debug_enabled: bool) -> Self {
        self.debug_enabled = debug_enabled;
        self
    }
}

/// Result of [`run_query`], shaped for the CLI and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub succeeded: bool,
    /// Last candidate executed, empty when the run never reached execution.
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub error: Option<String>,
    /// Debug attempts consumed.
    pub attempts: u32,
}

impl QueryReport {
    /// Builds a report from a finished run.
    pub fn from_state(state: WorkflowState) -> Self {
        let sql = state.current_sql().unwrap_or_default().to_string();
        let attempts = state.attempt_count();
        match state.into_outcome() {
            Outcome::Succeeded { columns, rows } => Self {
                succeeded: true,
                sql,
                columns,
                rows,
                error: None,
                attempts,
            },
            Outcome::Failed { message } => Self::failed(sql, message, attempts),
            Outcome::Pending => Self::failed(sql, "workflow did not finish".to_string(), attempts),
        }
    }

    fn failed(sql: String, message: String, attempts: u32) -> Self {
        Self {
            succeeded: false,
            sql,
            columns: Vec::new(),
            rows: Vec::new(),
            error: Some(message),
            attempts,
        }
    }
}

/// Answers `request` against a source from `registry`.
///
/// Unknown sources and schema failures are reported in the returned report,
/// like every other failure.
pub async fn run_query(
    request: &QueryRequest,
    registry: &SourceRegistry,
    generator: &dyn TextGenerator,
    settings: &WorkflowSettings,
) -> QueryReport {
    let setup = async {
        let schema = registry.get_schema(&request.source_id).await?;
        let source = registry.data_source(&request.source_id)?;
        Ok::<_, crate::error::QueryMendError>((schema, source))
    };
    let (schema, source) = match setup.await {
        Ok(ready) => ready,
        Err(e) => {
            warn!(source = %request.source_id, error = %e, "Cannot start query");
            return QueryReport::failed(String::new(), e.to_string(), 0);
        }
    };

    info!(
        source = %request.source_id,
        budget = request.attempt_budget,
        debug_enabled = request.debug_enabled,
        "Running query"
    );
    let state = WorkflowController::new(generator, source.as_ref(), settings.clone())
        .run(
            &request.question,
            &schema,
            request.attempt_budget,
            request.debug_enabled,
        )
        .await;

    QueryReport::from_state(state)
}

/// Validates `sql` and runs it once against a source from `registry`.
///
/// No generation or debugging is involved. Rejections and unknown sources
/// come back as failures, like backend errors.
pub async fn run_sql(
    sql: &str,
    source_id: &str,
    registry: &SourceRegistry,
    settings: &WorkflowSettings,
) -> ExecutionResult {
    if let Err(rejection) = check_sql(sql) {
        warn!(source = %source_id, %rejection, "Rejected direct SQL");
        return ExecutionResult::failure(format!("query rejected: {rejection}"));
    }
    let source = match registry.data_source(source_id) {
        Ok(source) => source,
        Err(e) => return ExecutionResult::failure(e.to_string()),
    };

    let mut executor = QueryExecutor::new(source.as_ref());
    if let Some(limit) = settings.execution_timeout {
        executor = executor.with_timeout(limit);
    }
    executor.execute(sql).await
}
