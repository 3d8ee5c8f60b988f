//! Command-line argument parsing for QueryMend.

use crate::config::Config;
use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ask questions of your databases in plain language.
#[derive(Parser, Debug)]
#[command(name = "querymend")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true, env = "QUERYMEND_CONFIG")]
    pub config: Option<PathBuf>,

    /// LLM provider to use (overrides config)
    #[arg(long, value_name = "PROVIDER", global = true)]
    pub llm: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a natural-language question
    Query(QueryArgs),

    /// Print the schema text of a data source
    Schema {
        /// Source name (defaults to the active source)
        #[arg(value_name = "SOURCE")]
        source: Option<String>,
    },

    /// List configured data sources
    Sources,

    /// Validate and run a SQL statement directly
    Sql {
        /// SQL statement (read-only)
        #[arg(value_name = "SQL")]
        sql: String,

        #[arg(short, long, value_name = "NAME")]
        source: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read questions and slash commands from stdin until `/quit` or end of input
    Interactive {
        #[arg(short, long, value_name = "NAME")]
        source: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Question to answer
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Data source name (defaults to the active source)
    #[arg(short, long, value_name = "NAME")]
    pub source: Option<String>,

    /// Maximum debug attempts after a failed execution
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Stop after the first failed execution
    #[arg(long)]
    pub no_debug: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    /// Returns the output format selected by flags.
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Default log level for the selected verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
