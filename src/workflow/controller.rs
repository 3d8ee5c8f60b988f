//! Workflow controller: generate, execute, and debug until done.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::debug::debug_sql;
use super::generate::generate_sql;
use super::state::{Outcome, WorkflowState};
use crate::config::Config;
use crate::db::DataSource;
use crate::error::QueryMendError;
use crate::llm::{GenerationOptions, TextGenerator};
use crate::query::{ExecutionResult, QueryExecutor};

/// Stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Generating,
    Executing,
    Debugging,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Generating => "generating",
            Self::Executing => "executing",
            Self::Debugging => "debugging",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Settings shared by every run, independent of the individual request.
#[derive(Debug, Clone, Default)]
pub struct WorkflowSettings {
    /// Sampling options for generation and debugging prompts.
    pub generation: GenerationOptions,
    /// Per-execution timeout; expiry counts as a failed execution.
    pub execution_timeout: Option<Duration>,
}

impl WorkflowSettings {
    /// Builds settings from the `[llm]` and `[workflow]` config sections.
    pub fn from_config(config: &Config) -> Self {
        Self {
            generation: config.llm.generation_options(),
            execution_timeout: Some(config.workflow.execution_timeout()),
        }
    }
}

/// Drives one question through the generate/execute/debug state machine.
pub struct WorkflowController<'a> {
    generator: &'a dyn TextGenerator,
    source: &'a dyn DataSource,
    settings: WorkflowSettings,
}

impl<'a> WorkflowController<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        source: &'a dyn DataSource,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            generator,
            source,
            settings,
        }
    }

    /// Runs the state machine to a terminal outcome.
    ///
    /// Performs at most `attempt_budget + 1` executions, or exactly one
    /// failing execution when `debug_enabled` is false.
    pub async fn run(
        &self,
        question: &str,
        schema_text: &str,
        attempt_budget: u32,
        debug_enabled: bool,
    ) -> WorkflowState {
        let mut state = WorkflowState::new(question, schema_text, attempt_budget);
        let mut executor = QueryExecutor::new(self.source);
        if let Some(limit) = self.settings.execution_timeout {
            executor = executor.with_timeout(limit);
        }

        let mut phase = Phase::Init;
        while phase != Phase::Done {
            let next = match phase {
                Phase::Init => Phase::Generating,
                Phase::Generating => {
                    let sql = generate_sql(
                        state.question(),
                        state.schema_text(),
                        self.generator,
                        &self.settings.generation,
                    )
                    .await;
                    state.start_candidate(sql);
                    Phase::Executing
                }
                Phase::Executing => self.execute(&executor, &mut state, debug_enabled).await,
                Phase::Debugging => {
                    let sql = debug_sql(
                        state.question(),
                        state.schema_text(),
                        state.current_sql().unwrap_or_default(),
                        state.last_error().unwrap_or_default(),
                        self.generator,
                        &self.settings.generation,
                    )
                    .await;
                    state.replace_candidate(sql);
                    Phase::Executing
                }
                Phase::Done => Phase::Done,
            };
            debug!(from = %phase, to = %next, attempt = state.attempt_count(), "Workflow transition");
            phase = next;
        }

        state
    }

    async fn execute(
        &self,
        executor: &QueryExecutor<'_>,
        state: &mut WorkflowState,
        debug_enabled: bool,
    ) -> Phase {
        let Some(sql) = state.current_sql().map(str::to_string) else {
            state.finish(Outcome::Failed {
                message: QueryMendError::internal("no SQL candidate to execute").to_string(),
            });
            return Phase::Done;
        };

        state.record_execution();
        match executor.execute(&sql).await {
            ExecutionResult::Success { columns, rows, .. } => {
                info!(
                    executions = state.execution_count(),
                    rows = rows.len(),
                    "Query succeeded"
                );
                state.finish(Outcome::Succeeded { columns, rows });
                Phase::Done
            }
            ExecutionResult::Failure { message } if debug_enabled && state.can_debug() => {
                state.begin_debug(message);
                info!(
                    attempt = state.attempt_count(),
                    budget = state.attempt_budget(),
                    "Execution failed, debugging"
                );
                Phase::Debugging
            }
            ExecutionResult::Failure { message } => {
                let error = QueryMendError::BudgetExhausted {
                    attempts: state.execution_count(),
                    last_error: message.clone(),
                };
                warn!(
                    attempt = state.attempt_count(),
                    budget = state.attempt_budget(),
                    debug_enabled,
                    "Giving up: {error}"
                );
                state.record_final_error(message);
                state.finish(Outcome::Failed {
                    message: error.to_string(),
                });
                Phase::Done
            }
        }
    }
}
