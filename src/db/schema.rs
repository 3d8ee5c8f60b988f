//! Database schema types for QueryMend.
//!
//! Represents the tables and columns of a data source, and renders them as the
//! flattened schema text embedded in generation and debug prompts.

use serde::{Deserialize, Serialize};

/// Prefix that opens each table block in schema text.
const TABLE_PREFIX: &str = "Table:";

/// Represents the complete schema of a data source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schema {
    /// All tables in the schema, in introspection order.
    pub tables: Vec<Table>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats the schema as prompt text.
    ///
    /// Each table becomes a `Table: name` line followed by one
    /// `  - column (TYPE, NULL|NOT NULL)` line per column, with a blank line
    /// between tables.
    pub fn format_schema_text(&self) -> String {
        self.tables
            .iter()
            .map(Table::format_block)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Returns true if the schema has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Represents a database table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Columns in the table.
    pub columns: Vec<Column>,
}

impl Table {
    /// Creates a new table with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    fn format_block(&self) -> String {
        std::iter::once(format!("{TABLE_PREFIX} {}", self.name))
            .chain(self.columns.iter().map(|c| {
                let nullable = if c.is_nullable { "NULL" } else { "NOT NULL" };
                format!("  - {} ({}, {})", c.name, c.data_type, nullable)
            }))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Represents a column in a table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared data type.
    pub data_type: String,

    /// Whether the column accepts NULL.
    pub is_nullable: bool,
}

impl Column {
    /// Creates a nullable column with the given name and type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }
}

/// Returns the first table named in schema text, if any.
pub fn first_table_name(schema_text: &str) -> Option<&str> {
    schema_text
        .lines()
        .find_map(|line| line.strip_prefix(TABLE_PREFIX))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}
