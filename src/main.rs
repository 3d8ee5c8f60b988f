//! QueryMend - natural-language questions over SQL databases.

use std::io::Write;

use anyhow::{Context, Result};
use querymend::cli::{Cli, Command, QueryArgs};
use querymend::config::Config;
use querymend::db::{SchemaProvider, SourceRegistry};
use querymend::llm::create_generator;
use querymend::logging;
use querymend::output::{render_report, render_sources, render_table};
use querymend::query::ExecutionResult;
use querymend::repl::Session;
use querymend::workflow::{run_query, run_sql, QueryRequest, WorkflowSettings};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    if matches!(cli.command, Command::Interactive { .. }) {
        logging::init_file_logging(cli.log_level());
    } else {
        logging::init_stderr_logging(cli.log_level());
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Runs the selected command. Returns `false` when the command itself failed.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if let Some(provider) = &cli.llm {
        config.llm.provider = provider.clone();
    }

    let registry = SourceRegistry::from_config(&config);
    let settings = WorkflowSettings::from_config(&config);

    match cli.command {
        Command::Sources => {
            println!("{}", render_sources(&registry.list()));
            Ok(true)
        }
        Command::Schema { source } => {
            let name = config.resolve_source_name(source.as_deref())?;
            let schema = registry.get_schema(name).await?;
            println!("{schema}");
            Ok(true)
        }
        Command::Sql { sql, source, json } => {
            let name = config.resolve_source_name(source.as_deref())?;
            let result = run_sql(&sql, name, &registry, &settings).await;
            print_sql_result(result, json)
        }
        Command::Query(args) => run_question(&config, &registry, &settings, args).await,
        Command::Interactive { source } => {
            let active = config
                .resolve_source_name(source.as_deref())
                .ok()
                .map(str::to_string);
            run_interactive(&config, &registry, settings, active).await?;
            Ok(true)
        }
    }
}

fn print_sql_result(result: ExecutionResult, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(result.is_success());
    }
    match result {
        ExecutionResult::Success { columns, rows, .. } => {
            println!("{}", render_table(&columns, &rows));
            Ok(true)
        }
        ExecutionResult::Failure { message } => {
            eprintln!("Error: {message}");
            Ok(false)
        }
    }
}

async fn run_question(
    config: &Config,
    registry: &SourceRegistry,
    settings: &WorkflowSettings,
    args: QueryArgs,
) -> Result<bool> {
    let name = config.resolve_source_name(args.source.as_deref())?;
    let generator = create_generator(&config.llm).context("creating LLM client")?;

    let request = QueryRequest::new(args.question.as_str(), name)
        .with_attempt_budget(args.max_retries.unwrap_or(config.workflow.attempt_budget))
        .with_debug(config.workflow.debug_enabled && !args.no_debug);
    let report = run_query(&request, registry, generator.as_ref(), settings).await;

    println!("{}", render_report(&report, args.output_format())?);
    Ok(report.succeeded)
}

async fn run_interactive(
    config: &Config,
    registry: &SourceRegistry,
    settings: WorkflowSettings,
    active: Option<String>,
) -> Result<()> {
    let generator = create_generator(&config.llm).context("creating LLM client")?;
    let mut session = Session::new(registry, generator.as_ref(), settings, active)
        .with_limits(config.workflow.attempt_budget, config.workflow.debug_enabled);

    println!("QueryMend v{}. Type /help for commands.", env!("CARGO_PKG_VERSION"));
    if let Some(active) = session.active_source() {
        println!("Active source: {active}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("querymend> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let reply = session.handle(&line).await;
        if !reply.output.is_empty() {
            println!("{}", reply.output);
        }
        if reply.quit {
            break;
        }
    }

    Ok(())
}
