//! Debug step: asks the generator to repair a failed query.

use tracing::{info, warn};

use super::generate::request_candidate;
use crate::llm::{debug_prompt, GenerationOptions, TextGenerator};

/// Query used when the repair attempt itself fails.
pub const DEBUG_FALLBACK_SQL: &str = "SELECT 1 AS debug_fallback";

/// Produces a corrected candidate for `failed_sql`. Never fails.
pub async fn debug_sql(
    question: &str,
    schema: &str,
    failed_sql: &str,
    error: &str,
    generator: &dyn TextGenerator,
    options: &GenerationOptions,
) -> String {
    let prompt = debug_prompt(question, schema, failed_sql, error);
    match request_candidate(generator, &prompt, options).await {
        Ok(sql) => {
            info!(sql_len = sql.len(), "Generated corrected SQL");
            sql
        }
        Err(e) => {
            warn!(error = %e, "Debugging failed, using fallback query");
            DEBUG_FALLBACK_SQL.to_string()
        }
    }
}
