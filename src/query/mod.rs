//! Query execution for QueryMend.
//!
//! Isolates running a validated statement against a data source from the
//! workflow that decides what to run.

pub mod executor;

pub use executor::{ExecutionResult, QueryExecutor};
