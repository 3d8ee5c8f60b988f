//! Shared fixtures for integration tests.

use querymend::db::SqliteSource;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// Seed data for the shop database.
pub const SHOP_SQL: &str = "
CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, city TEXT);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(id),
    total REAL NOT NULL
);
INSERT INTO customers (name, city) VALUES ('Ada', 'London'), ('Grace', 'New York'), ('Linus', NULL);
INSERT INTO orders (customer_id, total) VALUES (1, 10.5), (1, 20.0), (2, 7.25);
";

/// Creates a seeded shop database in a fresh temporary directory.
///
/// The directory must be kept alive for as long as the file is used.
pub async fn shop_db() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    sqlx::raw_sql(SHOP_SQL).execute(&mut conn).await.unwrap();
    conn.close().await.unwrap();
    (dir, path)
}

/// Creates a seeded shop database and a source for it.
pub async fn shop_source() -> (TempDir, SqliteSource) {
    let (dir, path) = shop_db().await;
    (dir, SqliteSource::new(path))
}
