//! SQLite data source implementation.
//!
//! Provides the `SqliteSource` struct that implements the `DataSource` trait
//! for SQLite files using sqlx.

use crate::db::{Column, ColumnInfo, DataSource, QueryResult, Row, Schema, Table, Value};
use crate::error::{QueryMendError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{
    Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo, ValueRef,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, warn};

/// SQLite data source backed by a database file.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    /// Creates a source for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh connection. The file must already exist.
    async fn connect(&self) -> Result<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(false);

        SqliteConnection::connect_with(&options).await.map_err(|e| {
            QueryMendError::connection(format!(
                "Cannot open SQLite database {}: {e}",
                self.path.display()
            ))
        })
    }

    async fn fetch_tables(conn: &mut SqliteConnection) -> Result<Vec<Table>> {
        let table_names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| QueryMendError::connection(format!("Failed to fetch tables: {e}")))?;

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let columns = Self::fetch_columns(conn, &name).await?;
            tables.push(Table { name, columns });
        }
        Ok(tables)
    }

    async fn fetch_columns(conn: &mut SqliteConnection, table_name: &str) -> Result<Vec<Column>> {
        let rows: Vec<(String, String, i64)> =
            sqlx::query_as(r#"SELECT name, type, "notnull" FROM pragma_table_info(?) ORDER BY cid"#)
                .bind(table_name)
                .fetch_all(&mut *conn)
                .await
                .map_err(|e| {
                    QueryMendError::connection(format!(
                        "Failed to fetch columns for {table_name}: {e}"
                    ))
                })?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, not_null)| Column {
                name,
                data_type,
                is_nullable: not_null == 0,
            })
            .collect())
    }
}

#[async_trait]
impl DataSource for SqliteSource {
    async fn fetch_all(&self, sql: &str) -> Result<QueryResult> {
        let mut conn = self.connect().await?;
        let start = Instant::now();

        let fetched = sqlx::query(sql).fetch_all(&mut conn).await;
        let columns = match &fetched {
            Ok(rows) if rows.is_empty() => statement_columns(&mut conn, sql).await,
            Ok(rows) => rows.first().map(row_columns).unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        close_quietly(conn).await;

        let rows = fetched.map_err(|e| QueryMendError::execution(format_query_error(e)))?;
        let rows = rows.iter().map(convert_row).collect::<Result<Vec<_>>>()?;
        let execution_time = start.elapsed();
        debug!(
            rows = rows.len(),
            duration_ms = execution_time.as_millis() as u64,
            "SQLite read completed"
        );

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let mut conn = self.connect().await?;
        let outcome = sqlx::query(sql).execute(&mut conn).await;
        close_quietly(conn).await;

        let done = outcome.map_err(|e| QueryMendError::execution(format_query_error(e)))?;
        Ok(done.rows_affected())
    }

    async fn introspect_schema(&self) -> Result<Schema> {
        let mut conn = self.connect().await?;
        let tables = Self::fetch_tables(&mut conn).await;
        close_quietly(conn).await;
        Ok(Schema { tables: tables? })
    }

    fn location(&self) -> String {
        format!("sqlite: {}", self.path.display())
    }
}

/// Closes a connection, logging instead of failing.
async fn close_quietly(conn: SqliteConnection) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close SQLite connection cleanly: {e}");
    }
}

/// Reads column metadata from a prepared statement, used when no rows came back.
async fn statement_columns(conn: &mut SqliteConnection, sql: &str) -> Vec<ColumnInfo> {
    match conn.prepare(sql).await {
        Ok(statement) => statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn row_columns(row: &SqliteRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx SqliteRow to our Row type, failing on undecodable values.
fn convert_row(row: &SqliteRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            convert_value(row, i).map_err(|e| {
                QueryMendError::execution(format!("Cannot read column '{}': {e}", col.name()))
            })
        })
        .collect()
}

/// Converts a single value using its runtime storage class.
fn convert_value(row: &SqliteRow, index: usize) -> std::result::Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_uppercase();

    let decoded = match type_name.as_str() {
        "INTEGER" | "INT" | "BIGINT" => row.try_get::<i64, _>(index).map(Value::Int),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row.try_get::<f64, _>(index).map(Value::Float),
        "BOOLEAN" => row.try_get::<bool, _>(index).map(Value::Bool),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::Bytes),
        _ => row.try_get::<String, _>(index).map(Value::String),
    };

    decoded.or_else(|_| row.try_get_unchecked::<String, _>(index).map(Value::String))
}

/// Extracts the database message from a sqlx error.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn seeded_source() -> (TempDir, SqliteSource) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::raw_sql(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, city TEXT);
             INSERT INTO customers (name, city) VALUES ('Ada', 'London'), ('Grace', NULL);",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn.close().await.unwrap();
        (dir, SqliteSource::new(path))
    }

    #[tokio::test]
    async fn test_fetch_all_returns_rows_and_columns() {
        let (_dir, source) = seeded_source().await;
        let result = source
            .fetch_all("SELECT id, name, city FROM customers ORDER BY id")
            .await
            .unwrap();

        assert_eq!(result.column_names(), vec!["id", "name", "city"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::Int(1), Value::from("Ada"), Value::from("London")],
                vec![Value::Int(2), Value::from("Grace"), Value::Null],
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_all_empty_result_keeps_columns() {
        let (_dir, source) = seeded_source().await;
        let result = source
            .fetch_all("SELECT id, name FROM customers WHERE id > 100")
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.column_names(), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn test_fetch_all_reports_backend_error() {
        let (_dir, source) = seeded_source().await;
        let err = source
            .fetch_all("SELECT emal FROM customers")
            .await
            .unwrap_err();
        assert!(matches!(err, QueryMendError::Execution(_)));
        assert!(err.to_string().contains("no such column"));
    }

    #[tokio::test]
    async fn test_execute_reports_affected_rows() {
        let (_dir, source) = seeded_source().await;
        let affected = source
            .execute("UPDATE customers SET city = 'Paris'")
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let result = source
            .fetch_all("SELECT DISTINCT city FROM customers")
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::from("Paris")]]);
    }

    #[tokio::test]
    async fn test_introspect_schema() {
        let (_dir, source) = seeded_source().await;
        let schema = source.introspect_schema().await.unwrap();
        assert_eq!(
            schema.format_schema_text(),
            "Table: customers\n  - id (INTEGER, NULL)\n  - name (TEXT, NOT NULL)\n  - city (TEXT, NULL)"
        );
    }

    #[tokio::test]
    async fn test_computed_values_keep_their_storage_class() {
        let (_dir, source) = seeded_source().await;
        let result = source
            .fetch_all("SELECT date('2024-03-01') AS day, AVG(id) AS avg_id, COUNT(city) AS n FROM customers")
            .await
            .unwrap();
        assert_eq!(
            result.rows,
            vec![vec![Value::from("2024-03-01"), Value::Float(1.5), Value::Int(1)]]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SqliteSource::new(dir.path().join("missing.db"));
        let err = source.fetch_all("SELECT 1").await.unwrap_err();
        assert!(matches!(err, QueryMendError::Connection(_)));
    }
}
