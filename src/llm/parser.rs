//! Response parsing for generator outputs.
//!
//! The generator is asked to answer with exactly one fenced block:
//!
//! ~~~text
//! ```yaml
//! sql: |
//!   SELECT ...
//! ```
//! ~~~
//!
//! This module extracts the query from that block. It never rewrites the SQL
//! beyond trimming whitespace and one trailing terminator.

use serde::Deserialize;

use crate::error::{QueryMendError, Result};

/// Opening fence tag for the structured block.
const YAML_FENCE: &str = "```yaml";

/// Closing fence.
const FENCE: &str = "```";

#[derive(Debug, Deserialize)]
struct SqlBlock {
    sql: Option<String>,
}

/// Extracts the SQL query from a generator response.
///
/// Fails with `MalformedResponse` when there is no yaml block, the block is
/// not valid YAML, or the `sql` key is missing or empty.
pub fn parse_sql(response: &str) -> Result<String> {
    let block = extract_yaml_block(response)
        .ok_or_else(|| QueryMendError::malformed("no ```yaml block found", response))?;

    let parsed: SqlBlock = serde_yaml::from_str(block).map_err(|e| {
        QueryMendError::malformed(format!("YAML parsing error: {e}"), response)
    })?;

    let sql = parsed
        .sql
        .ok_or_else(|| QueryMendError::malformed("missing 'sql' key", response))?;

    let sql = strip_terminator(&sql);
    if sql.is_empty() {
        return Err(QueryMendError::malformed("empty 'sql' value", response));
    }

    Ok(sql.to_string())
}

/// Returns the body of the first ```yaml fenced block.
fn extract_yaml_block(text: &str) -> Option<&str> {
    let start = text.find(YAML_FENCE)? + YAML_FENCE.len();
    let rest = &text[start..];

    // The tag line must end right after `yaml` (ignoring spaces).
    let newline = rest.find('\n')?;
    if !rest[..newline].trim().is_empty() {
        return None;
    }

    let body = &rest[newline + 1..];
    let end = body.find(FENCE)?;
    Some(&body[..end])
}

/// Trims whitespace and removes one trailing `;`.
fn strip_terminator(sql: &str) -> &str {
    let trimmed = sql.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_block_scalar() {
        let response = "```yaml\nsql: |\n  SELECT 1\n```";
        assert_eq!(parse_sql(response).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_parse_strips_single_terminator() {
        let response = "Here you go:\n\n```yaml\nsql: |\n  SELECT name\n  FROM customers;\n```\n";
        assert_eq!(parse_sql(response).unwrap(), "SELECT name\nFROM customers");
    }

    #[test]
    fn test_parse_only_one_terminator_removed() {
        let response = "```yaml\nsql: \"SELECT 1;;\"\n```";
        assert_eq!(parse_sql(response).unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_parse_inline_value() {
        let response = "```yaml\nsql: SELECT COUNT(*) FROM orders\n```";
        assert_eq!(parse_sql(response).unwrap(), "SELECT COUNT(*) FROM orders");
    }

    #[test]
    fn test_parse_uses_first_yaml_block() {
        let response = "```sql\nSELECT 2\n```\n```yaml\nsql: |\n  SELECT 1\n```\n```yaml\nsql: SELECT 3\n```";
        assert_eq!(parse_sql(response).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_parse_fails_without_block() {
        let err = parse_sql("SELECT * FROM users").unwrap_err();
        match err {
            QueryMendError::MalformedResponse { raw, .. } => {
                assert_eq!(raw, "SELECT * FROM users");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_fails_on_sql_fence() {
        assert!(matches!(
            parse_sql("```sql\nSELECT 1\n```"),
            Err(QueryMendError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_parse_fails_without_sql_key() {
        let err = parse_sql("```yaml\nquery: SELECT 1\n```").unwrap_err();
        assert!(err.to_string().contains("missing 'sql' key"));
    }

    #[test]
    fn test_parse_fails_on_empty_sql() {
        assert!(parse_sql("```yaml\nsql: \"  ;\"\n```").is_err());
        assert!(parse_sql("```yaml\nsql: \"\"\n```").is_err());
    }

    #[test]
    fn test_parse_fails_on_invalid_yaml() {
        let err = parse_sql("```yaml\nsql: [unclosed\n```").unwrap_err();
        assert!(err.to_string().contains("YAML parsing error"));
    }

    #[test]
    fn test_parse_fails_on_unclosed_fence() {
        assert!(parse_sql("```yaml\nsql: SELECT 1\n").is_err());
    }

    #[test]
    fn test_parse_fails_on_non_mapping() {
        assert!(parse_sql("```yaml\n- SELECT 1\n```").is_err());
    }
}
