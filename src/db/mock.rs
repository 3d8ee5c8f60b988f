//! Mock data source for testing.
//!
//! Replays scripted outcomes and counts how many statements were run.

use super::{ColumnInfo, DataSource, QueryResult, Schema, Value};
use crate::error::{QueryMendError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Outcome = std::result::Result<QueryResult, String>;

/// A data source that returns predefined results.
///
/// Scripted outcomes are consumed in order; afterwards every statement gets
/// the fallback outcome (a one-row success unless overridden).
#[derive(Debug)]
pub struct MockDataSource {
    schema: Schema,
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    executed: Mutex<Vec<String>>,
    introspections: AtomicUsize,
}

impl Default for MockDataSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDataSource {
    /// Creates a mock source with an empty schema that always succeeds.
    pub fn new() -> Self {
        Self {
            schema: Schema::default(),
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(Self::single_row()),
            executed: Mutex::new(Vec::new()),
            introspections: AtomicUsize::new(0),
        }
    }

    /// Creates a mock source whose every statement fails with `message`.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self::new().otherwise(Err(message.into()))
    }

    /// Sets the schema returned by introspection.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Queues a successful result.
    pub fn succeed(self, result: QueryResult) -> Self {
        self.push(Ok(result))
    }

    /// Queues a backend failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    /// Sets the outcome used after the script runs out.
    pub fn otherwise(mut self, outcome: Outcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Returns the number of statements run so far.
    pub fn execution_count(&self) -> usize {
        self.executed.lock().map(|e| e.len()).unwrap_or_default()
    }

    /// Returns the statements run so far, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Returns how many times the schema was introspected.
    pub fn introspection_count(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }

    fn single_row() -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("result", "INTEGER")],
            vec![vec![Value::Int(1)]],
        )
    }

    fn push(self, outcome: Outcome) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    fn next_outcome(&self, sql: &str) -> Outcome {
        if let Ok(mut executed) = self.executed.lock() {
            executed.push(sql.to_string());
        }
        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch_all(&self, sql: &str) -> Result<QueryResult> {
        self.next_outcome(sql).map_err(QueryMendError::execution)
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.next_outcome(sql)
            .map(|r| r.rows_affected)
            .map_err(QueryMendError::execution)
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        self.introspections.fetch_add(1, Ordering::SeqCst);
        Ok(self.schema.clone())
    }

    fn location(&self) -> String {
        "mock".to_string()
    }
}
