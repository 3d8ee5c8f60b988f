//! Generation step: question and schema in, validated SQL out.
//!
//! Never fails. Generator, parse and validation problems are logged and a
//! deterministic fallback query is returned instead.

use tracing::{debug, info, warn};

use crate::db::first_table_name;
use crate::error::{QueryMendError, Result};
use crate::llm::{generation_prompt, parse_sql, GenerationOptions, TextGenerator};
use crate::safety::{check_sql, validate};

/// Query used when no better fallback applies.
pub const CONSTANT_FALLBACK_SQL: &str = "SELECT 1 AS result";

/// Query used when the question asks for a count.
pub const COUNT_FALLBACK_SQL: &str = "SELECT COUNT(*) AS count FROM (SELECT 1 LIMIT 1)";

const COUNT_WORDS: &[&str] = &["count", "how many"];
const LIST_WORDS: &[&str] = &["list", "show", "all"];

/// Produces a validated candidate for `question`.
pub async fn generate_sql(
    question: &str,
    schema: &str,
    generator: &dyn TextGenerator,
    options: &GenerationOptions,
) -> String {
    let prompt = generation_prompt(question, schema);
    match request_candidate(generator, &prompt, options).await {
        Ok(sql) => {
            info!(sql_len = sql.len(), "Generated SQL candidate");
            sql
        }
        Err(e) => {
            let sql = fallback_sql(question, schema);
            warn!(error = %e, fallback = %sql, "Generation failed, using fallback query");
            sql
        }
    }
}

/// Sends a prompt and turns the reply into a validated query.
pub(crate) async fn request_candidate(
    generator: &dyn TextGenerator,
    prompt: &str,
    options: &GenerationOptions,
) -> Result<String> {
    let response = generator.complete(prompt, options).await?;
    debug!(response_len = response.len(), "Generator replied");

    let sql = parse_sql(&response)?;
    check_sql(&sql).map_err(|r| QueryMendError::ValidationRejected(r.to_string()))?;
    Ok(sql)
}

/// Picks a placeholder query from keywords in the question.
///
/// Counting questions get a constant count; listing questions read a few rows
/// from the first table named in the schema. The result always validates.
pub fn fallback_sql(question: &str, schema: &str) -> String {
    let lower = question.to_lowercase();

    if COUNT_WORDS.iter().any(|w| lower.contains(w)) {
        return COUNT_FALLBACK_SQL.to_string();
    }

    if LIST_WORDS.iter().any(|w| lower.contains(w)) {
        if let Some(table) = first_table_name(schema) {
            let sql = format!("SELECT * FROM {table} LIMIT 10");
            if validate(&sql) {
                return sql;
            }
        }
    }

    CONSTANT_FALLBACK_SQL.to_string()
}
