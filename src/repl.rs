//! Interactive session: slash commands and natural-language questions.
//!
//! Parsing is separate from execution so command handling can be tested
//! without a terminal.

use tracing::info;

use crate::db::{SchemaProvider, SourceRegistry};
use crate::llm::TextGenerator;
use crate::output::{render_report, render_sources, render_table, OutputFormat};
use crate::query::ExecutionResult;
use crate::workflow::{run_query, run_sql, QueryRequest, WorkflowSettings};

/// Text shown for `/help`.
pub const HELP_TEXT: &str = "Commands:
  /help             Show this help
  /sources          List data sources
  /schema [source]  Show schema
  /active <source>  Switch the source used for questions
  /sql <query>      Validate and run SQL directly
  /quit, /q         Exit
Any other text is treated as a question.";

/// A parsed line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Sources,
    Schema(Option<String>),
    Active(Option<String>),
    Sql(String),
    Quit,
    Question(String),
    Empty,
    Unknown(String),
}

impl ReplCommand {
    /// Parses one line of input.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();

        if input.is_empty() {
            return Self::Empty;
        }

        if !input.starts_with('/') {
            return Self::Question(input.to_string());
        }

        let (command, args) = match input.split_once(char::is_whitespace) {
            Some((command, args)) => (command.to_lowercase(), args.trim()),
            None => (input.to_lowercase(), ""),
        };
        let optional = (!args.is_empty()).then(|| args.to_string());

        match command.as_str() {
            "/help" => Self::Help,
            "/sources" => Self::Sources,
            "/schema" => Self::Schema(optional),
            "/active" => Self::Active(optional),
            "/sql" => Self::Sql(args.to_string()),
            "/quit" | "/q" | "/exit" => Self::Quit,
            _ => Self::Unknown(command),
        }
    }
}

/// Reply to one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplReply {
    pub output: String,
    pub quit: bool,
}

impl ReplReply {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            quit: false,
        }
    }
}

/// State of one interactive session.
pub struct Session<'a> {
    registry: &'a SourceRegistry,
    generator: &'a dyn TextGenerator,
    settings: WorkflowSettings,
    attempt_budget: u32,
    debug_enabled: bool,
    active: Option<String>,
}

impl<'a> Session<'a> {
    pub fn new(
        registry: &'a SourceRegistry,
        generator: &'a dyn TextGenerator,
        settings: WorkflowSettings,
        active: Option<String>,
    ) -> Self {
        Self {
            registry,
            generator,
            settings,
            attempt_budget: crate::workflow::DEFAULT_ATTEMPT_BUDGET,
            debug_enabled: true,
            active,
        }
    }

    /// Sets the debug loop limits used for questions.
    pub fn with_limits(mut self, attempt_budget: u32, debug_enabled: bool) -> Self {
        self.attempt_budget = attempt_budget;
        self.debug_enabled = debug_enabled;
        self
    }

    /// Returns the source questions currently go to.
    pub fn active_source(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Handles one line of input.
    pub async fn handle(&mut self, line: &str) -> ReplReply {
        match ReplCommand::parse(line) {
            ReplCommand::Empty => ReplReply::text(""),
            ReplCommand::Help => ReplReply::text(HELP_TEXT),
            ReplCommand::Quit => ReplReply {
                output: "Goodbye!".to_string(),
                quit: true,
            },
            ReplCommand::Sources => ReplReply::text(render_sources(&self.registry.list())),
            ReplCommand::Unknown(command) => {
                ReplReply::text(format!("Unknown command: {command}. Type /help for help."))
            }
            ReplCommand::Active(None) => ReplReply::text("Please specify a source name."),
            ReplCommand::Active(Some(name)) => match self.registry.data_source(&name) {
                Ok(_) => {
                    info!(source = %name, "Switched active source");
                    let reply = format!("Active source: {name}");
                    self.active = Some(name);
                    ReplReply::text(reply)
                }
                Err(e) => ReplReply::text(format!("Error: {e}")),
            },
            ReplCommand::Schema(name) => {
                let Some(name) = name.or_else(|| self.active.clone()) else {
                    return ReplReply::text("No active data source.");
                };
                match self.registry.get_schema(&name).await {
                    Ok(schema) => ReplReply::text(schema),
                    Err(e) => ReplReply::text(format!("Error: {e}")),
                }
            }
            ReplCommand::Sql(sql) => ReplReply::text(self.sql_reply(&sql).await),
            ReplCommand::Question(question) => {
                let Some(source) = self.active.clone() else {
                    return ReplReply::text("No active data source. Use /active <source> first.");
                };
                let request = QueryRequest::new(question, source)
                    .with_attempt_budget(self.attempt_budget)
                    .with_debug(self.debug_enabled);
                let report =
                    run_query(&request, self.registry, self.generator, &self.settings).await;
                match render_report(&report, OutputFormat::Text) {
                    Ok(text) => ReplReply::text(text),
                    Err(e) => ReplReply::text(format!("Error: {e}")),
                }
            }
        }
    }

    async fn sql_reply(&self, sql: &str) -> String {
        let Some(name) = self.active.as_deref() else {
            return "No active data source.".to_string();
        };
        match run_sql(sql, name, self.registry, &self.settings).await {
            ExecutionResult::Success { columns, rows, .. } => render_table(&columns, &rows),
            ExecutionResult::Failure { message } => format!("Error: {message}"),
        }
    }
}
