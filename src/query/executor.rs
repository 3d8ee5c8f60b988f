//! Query execution against a data source.
//!
//! Runs a single statement and folds every backend problem into
//! [`ExecutionResult::Failure`], so callers never see an execution error as a fault.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::db::{DataSource, Row};
use crate::safety::is_read_query;

/// Result of executing one statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionResult {
    /// Statement ran. Non-read statements report no columns and no rows.
    Success {
        columns: Vec<String>,
        rows: Vec<Row>,
        rows_affected: u64,
    },
    /// Backend error, connection problem or timeout.
    Failure { message: String },
}

impl ExecutionResult {
    /// Creates a failure with the given message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Executes statements against a borrowed data source.
pub struct QueryExecutor<'a> {
    source: &'a dyn DataSource,
    timeout: Option<Duration>,
}

impl<'a> QueryExecutor<'a> {
    /// Creates an executor with no per-call timeout.
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self {
            source,
            timeout: None,
        }
    }

    /// Bounds each statement; expiry is reported as a failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs `sql` and classifies the outcome.
    pub async fn execute(&self, sql: &str) -> ExecutionResult {
        let start = Instant::now();
        let read = is_read_query(sql);

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(sql, read)).await {
                Ok(outcome) => outcome,
                Err(_) => ExecutionResult::failure(format!(
                    "Query timed out after {} seconds",
                    limit.as_secs_f64()
                )),
            },
            None => self.run(sql, read).await,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            ExecutionResult::Success { rows, .. } => {
                debug!(duration_ms, rows = rows.len(), read, "Statement executed");
            }
            ExecutionResult::Failure { message } => {
                warn!(duration_ms, read, error = %message, "Statement failed");
            }
        }
        outcome
    }

    async fn run(&self, sql: &str, read: bool) -> ExecutionResult {
        if read {
            match self.source.fetch_all(sql).await {
                Ok(result) => ExecutionResult::Success {
                    columns: result.column_names(),
                    rows: result.rows,
                    rows_affected: 0,
                },
                Err(e) => ExecutionResult::failure(e.to_string()),
            }
        } else {
            match self.source.execute(sql).await {
                Ok(rows_affected) => ExecutionResult::Success {
                    columns: Vec::new(),
                    rows: Vec::new(),
                    rows_affected,
                },
                Err(e) => ExecutionResult::failure(e.to_string()),
            }
        }
    }
}
