//! Lexical SQL validation.
//!
//! Rules are applied in order and the first failure wins:
//! non-empty, read-only prefix, forbidden keywords, suspicious patterns.

use std::sync::OnceLock;

use regex::Regex;

use super::{is_read_query, Rejection, FORBIDDEN_KEYWORDS};

/// Compiled validation patterns.
#[derive(Debug)]
pub struct SqlValidator {
    keywords: Vec<(&'static str, Regex)>,
    trailing_statement: Regex,
}

impl SqlValidator {
    /// Compiles the validator patterns.
    pub fn new() -> Self {
        let keywords = FORBIDDEN_KEYWORDS
            .iter()
            .map(|kw| {
                let pattern = format!(r"(?i)\b{kw}\b");
                (*kw, Regex::new(&pattern).expect("keyword pattern is valid"))
            })
            .collect();

        Self {
            keywords,
            trailing_statement: Regex::new(r";\s*\S").expect("terminator pattern is valid"),
        }
    }

    /// Returns a shared validator instance.
    pub fn shared() -> &'static SqlValidator {
        static VALIDATOR: OnceLock<SqlValidator> = OnceLock::new();
        VALIDATOR.get_or_init(SqlValidator::new)
    }

    /// Checks a candidate query, returning the first rule it breaks.
    pub fn check(&self, sql: &str) -> Result<(), Rejection> {
        let upper = sql.trim().to_uppercase();

        if upper.is_empty() {
            return Err(Rejection::Empty);
        }

        if !is_read_query(&upper) {
            return Err(Rejection::NotReadOnly);
        }

        if let Some((kw, _)) = self.keywords.iter().find(|(_, re)| re.is_match(&upper)) {
            return Err(Rejection::ForbiddenKeyword(kw));
        }

        if upper.contains("--") || upper.contains("/*") || upper.contains("*/") {
            return Err(Rejection::Comment);
        }

        if upper.contains("XP_") || upper.contains("SP_") {
            return Err(Rejection::ProcedurePrefix);
        }

        if self.trailing_statement.is_match(&upper) {
            return Err(Rejection::MultipleStatements);
        }

        Ok(())
    }
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a candidate query with the shared validator.
pub fn check_sql(sql: &str) -> Result<(), Rejection> {
    SqlValidator::shared().check(sql)
}

/// Returns true if the query is an admissible single read statement.
pub fn validate(sql: &str) -> bool {
    check_sql(sql).is_ok()
}
