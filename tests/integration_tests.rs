//! Integration tests for QueryMend.
//!
//! SQLite tests run against temporary database files. PostgreSQL tests
//! require a running server; set DATABASE_URL to run them.
//!
//! Run with: `cargo test --test integration_tests`

mod integration;
