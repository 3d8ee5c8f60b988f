//! Result rendering for the command line.

use crate::db::{Row, SourceSummary};
use crate::error::{QueryMendError, Result};
use crate::workflow::QueryReport;

/// Printed in place of a table when a query returns no rows.
pub const NO_RESULTS: &str = "(No results found)";

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table.
    #[default]
    Text,
    /// Pretty-printed JSON report.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// Formats rows as an aligned text table.
pub fn render_table(columns: &[String], rows: &[Row]) -> String {
    if rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_display_string()).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |values: &[String]| -> String {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let width = widths.get(i).copied().unwrap_or(0);
                format!("{v:width$}")
            })
            .collect::<Vec<_>>()
            .join(" │ ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    output.push_str(&line(columns));
    output.push('\n');
    output.push_str(
        &widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
    );
    for row in &cells {
        output.push('\n');
        output.push_str(&line(row.as_slice()));
    }
    output
}

/// Renders a query report in the requested format.
pub fn render_report(report: &QueryReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| QueryMendError::internal(format!("Failed to serialize report: {e}"))),
        OutputFormat::Text => {
            let mut output = String::new();
            if !report.sql.is_empty() {
                output.push_str(&format!("SQL: {}\n\n", report.sql));
            }
            match &report.error {
                None => output.push_str(&render_table(&report.columns, &report.rows)),
                Some(error) => output.push_str(&format!("Error: {error}")),
            }
            Ok(output)
        }
    }
}

/// Formats the configured sources, one per line.
pub fn render_sources(sources: &[SourceSummary]) -> String {
    if sources.is_empty() {
        return "No data sources configured.".to_string();
    }

    sources
        .iter()
        .map(|s| {
            let marker = if s.active { "*" } else { " " };
            if s.description.is_empty() {
                format!("{marker} {} ({})", s.name, s.location)
            } else {
                format!("{marker} {} ({}) - {}", s.name, s.location, s.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
