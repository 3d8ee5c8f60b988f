//! Per-run workflow state.

use crate::db::Row;

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Outcome {
    #[default]
    Pending,
    Succeeded {
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Failed {
        message: String,
    },
}

impl Outcome {
    /// Returns true once the run has finished.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Mutable record owned by one workflow run.
///
/// `outcome` leaves `Pending` exactly once, and `attempt_count` never exceeds
/// `attempt_budget`.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    question: String,
    schema_text: String,
    current_sql: Option<String>,
    last_error: Option<String>,
    attempt_count: u32,
    attempt_budget: u32,
    execution_count: u32,
    outcome: Outcome,
}

impl WorkflowState {
    /// Creates the state for a new run.
    pub fn new(
        question: impl Into<String>,
        schema_text: impl Into<String>,
        attempt_budget: u32,
    ) -> Self {
        Self {
            question: question.into(),
            schema_text: schema_text.into(),
            current_sql: None,
            last_error: None,
            attempt_count: 0,
            attempt_budget,
            execution_count: 0,
            outcome: Outcome::Pending,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    /// The candidate most recently produced by generation or debugging.
    pub fn current_sql(&self) -> Option<&str> {
        self.current_sql.as_deref()
    }

    /// Error from the last failed execution, until debugging replaces the candidate.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn attempt_budget(&self) -> u32 {
        self.attempt_budget
    }

    /// Number of statements handed to the executor.
    pub fn execution_count(&self) -> u32 {
        self.execution_count
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Consumes the state, returning its outcome.
    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }

    /// Installs a freshly generated candidate and resets the debug counter.
    pub(crate) fn start_candidate(&mut self, sql: String) {
        self.current_sql = Some(sql);
        self.last_error = None;
        self.attempt_count = 0;
    }

    /// Replaces the candidate with a debugged one.
    pub(crate) fn replace_candidate(&mut self, sql: String) {
        self.current_sql = Some(sql);
        self.last_error = None;
    }

    pub(crate) fn record_execution(&mut self) {
        self.execution_count += 1;
    }

    /// Returns true if another debug attempt fits in the budget.
    pub fn can_debug(&self) -> bool {
        self.attempt_count < self.attempt_budget
    }

    /// Records a failed execution that will be debugged.
    pub(crate) fn begin_debug(&mut self, error: String) {
        debug_assert!(self.can_debug());
        self.attempt_count += 1;
        self.last_error = Some(error);
    }

    /// Records the final failed execution.
    pub(crate) fn record_final_error(&mut self, error: String) {
        self.last_error = Some(error);
    }

    /// Sets the terminal outcome. Ignored once the run has finished.
    pub(crate) fn finish(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        self.outcome = outcome;
        true
    }
}
