//! Integration tests for QueryMend.

pub mod common;
pub mod config_test;
pub mod postgres_test;
pub mod sqlite_test;
pub mod workflow_test;
