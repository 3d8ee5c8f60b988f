//! QueryMend - natural-language questions over SQL databases.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod output;
pub mod query;
pub mod repl;
pub mod safety;
pub mod workflow;
