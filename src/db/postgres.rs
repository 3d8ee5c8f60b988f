//! PostgreSQL data source implementation.
//!
//! Provides the `PostgresSource` struct that implements the `DataSource` trait
//! for PostgreSQL databases using sqlx. Each call opens its own connection.

use crate::db::{Column, ColumnInfo, DataSource, QueryResult, Row, Schema, Table, Value};
use crate::error::{QueryMendError, Result};
use async_trait::async_trait;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgConnection, PgRow, Postgres};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, JsonValue, Uuid};
use sqlx::{Column as SqlxColumn, Connection, Executor, Row as SqlxRow, Statement, TypeInfo};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Maximum number of connection attempts.
const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Base delay between connection attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// PostgreSQL data source.
#[derive(Clone)]
pub struct PostgresSource {
    url: String,
}

impl std::fmt::Debug for PostgresSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSource")
            .field("location", &self.location())
            .finish()
    }
}

impl PostgresSource {
    /// Creates a source for the given connection URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Opens a fresh connection, retrying transient failures.
    async fn connect(&self) -> Result<PgConnection> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut attempt = 1;

        loop {
            debug!("Connection attempt {} of {}", attempt, MAX_CONNECT_ATTEMPTS);

            match PgConnection::connect(&self.url).await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt < MAX_CONNECT_ATTEMPTS && is_transient_error(&e) => {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(self.map_connection_error(e)),
            }
        }
    }

    /// Maps sqlx connection errors to user-facing messages.
    fn map_connection_error(&self, error: sqlx::Error) -> QueryMendError {
        let parsed = Url::parse(&self.url).ok();
        let host = parsed
            .as_ref()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());
        let port = parsed.as_ref().and_then(Url::port).unwrap_or(5432);
        let user = parsed
            .as_ref()
            .map(|u| u.username().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let error_str = error.to_string().to_lowercase();

        if error_str.contains("connection refused") || error_str.contains("could not connect") {
            QueryMendError::connection(format!(
                "Cannot connect to {host}:{port}. Check that the server is running."
            ))
        } else if error_str.contains("password authentication failed")
            || error_str.contains("authentication failed")
        {
            QueryMendError::connection(format!(
                "Authentication failed for user '{user}'. Check your credentials."
            ))
        } else if error_str.contains("does not exist") && error_str.contains("database") {
            QueryMendError::connection(format!("Database at {host}:{port} does not exist."))
        } else if error_str.contains("timed out") || error_str.contains("timeout") {
            QueryMendError::connection(format!(
                "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
            ))
        } else {
            QueryMendError::connection(error.to_string())
        }
    }

    async fn fetch_tables(conn: &mut PgConnection) -> Result<Vec<Table>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                table_name::text,
                column_name::text,
                data_type::text,
                is_nullable::text
            FROM information_schema.columns
            WHERE table_schema = 'public'
            ORDER BY table_name, ordinal_position
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| QueryMendError::connection(format!("Failed to fetch columns: {e}")))?;

        let mut tables: Vec<Table> = Vec::new();
        for (table_name, name, data_type, is_nullable) in rows {
            if tables.last().map(|t| t.name.as_str()) != Some(table_name.as_str()) {
                tables.push(Table::new(table_name));
            }
            if let Some(table) = tables.last_mut() {
                table.columns.push(Column {
                    name,
                    data_type,
                    is_nullable: is_nullable == "YES",
                });
            }
        }
        Ok(tables)
    }
}

#[async_trait]
impl DataSource for PostgresSource {
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
            "PostgreSQL read completed"
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
        match Url::parse(&self.url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or("localhost");
                let port = url.port().unwrap_or(5432);
                let database = url.path().trim_start_matches('/');
                format!("postgres: {database} @ {host}:{port}")
            }
            Err(_) => "postgres: <invalid url>".to_string(),
        }
    }
}

/// Closes a connection, logging instead of failing.
async fn close_quietly(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close PostgreSQL connection cleanly: {e}");
    }
}

/// Reads column metadata from a prepared statement, used when no rows came back.
async fn statement_columns(conn: &mut PgConnection, sql: &str) -> Vec<ColumnInfo> {
    match conn.prepare(sql).await {
        Ok(statement) => statement
            .columns()
            .iter()
            .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn row_columns(row: &PgRow) -> Vec<ColumnInfo> {
    row.columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx PgRow to our Row type.
///
/// A value that cannot be decoded fails the whole read, naming the column,
/// so the caller sees an execution error instead of a silent NULL.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let type_name = col.type_info().name();
            convert_value(row, i, type_name).map_err(|e| {
                QueryMendError::execution(format!(
                    "Cannot read column '{}' of type {type_name}: {e}. Cast it to text in the query.",
                    col.name()
                ))
            })
        })
        .collect()
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> std::result::Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(
    row: &PgRow,
    index: usize,
    type_name: &str,
) -> std::result::Result<Value, sqlx::Error> {
    let value = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool>(row, index)?.map(Value::Bool),
        "INT2" | "SMALLINT" => decode::<i16>(row, index)?.map(Value::from),
        "INT4" | "INT" | "INTEGER" => decode::<i32>(row, index)?.map(Value::from),
        "INT8" | "BIGINT" => decode::<i64>(row, index)?.map(Value::Int),
        "OID" => decode::<Oid>(row, index)?.map(|oid| Value::Int(i64::from(oid.0))),
        "FLOAT4" | "REAL" => decode::<f32>(row, index)?.map(|v| Value::Float(f64::from(v))),
        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64>(row, index)?.map(Value::Float),
        // Rendered as text to keep every digit.
        "NUMERIC" | "DECIMAL" => decode::<Decimal>(row, index)?.map(|d| Value::String(d.to_string())),
        "DATE" => decode::<NaiveDate>(row, index)?.map(|d| Value::String(d.to_string())),
        "TIME" => decode::<NaiveTime>(row, index)?.map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index)?.map(|t| Value::String(t.to_string())),
        "TIMESTAMPTZ" => {
            decode::<DateTime<Utc>>(row, index)?.map(|t| Value::String(t.to_rfc3339()))
        }
        "INTERVAL" => decode::<PgInterval>(row, index)?.map(|i| Value::String(format_interval(&i))),
        "UUID" => decode::<Uuid>(row, index)?.map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => decode::<JsonValue>(row, index)?.map(|j| Value::String(j.to_string())),
        "BYTEA" => decode::<Vec<u8>>(row, index)?.map(Value::Bytes),
        _ => decode::<String>(row, index)?.map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Formats an interval the way psql prints it, e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i32, singular: &str, plural: &str) -> Option<String> {
        match n {
            0 => None,
            1 | -1 => Some(format!("{n} {singular}")),
            _ => Some(format!("{n} {plural}")),
        }
    }

    let mut parts: Vec<String> = [
        unit(interval.months / 12, "year", "years"),
        unit(interval.months % 12, "mon", "mons"),
        unit(interval.days, "day", "days"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let fraction = micros % 1_000_000;
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// Determines if a connection error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
}

/// Formats a query error with PostgreSQL detail and hint when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());
    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }
    result
}
