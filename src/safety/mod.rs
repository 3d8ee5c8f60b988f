//! Query safety validation module.
//!
//! A lexical gate that admits only single-statement read queries before any
//! generated SQL reaches a data source. It is not a SQL parser: it rejects
//! everything that looks capable of mutation or statement stacking.

mod validator;

pub use validator::{check_sql, validate, SqlValidator};

use std::fmt;

/// Keywords that reject a query when they appear as whole words.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "CREATE", "TRUNCATE", "EXEC", "EXECUTE",
    "PRAGMA", "ATTACH", "DETACH",
];

/// Returns true if the statement starts with `SELECT` or `WITH`, ignoring case
/// and leading whitespace.
pub fn is_read_query(sql: &str) -> bool {
    let head = sql.trim_start();
    ["SELECT", "WITH"].iter().any(|kw| {
        head.get(..kw.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
    })
}

/// Reason a candidate SQL string was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Nothing left after trimming.
    Empty,
    /// Statement does not start with SELECT or WITH.
    NotReadOnly,
    /// A forbidden keyword appears as a whole word.
    ForbiddenKeyword(&'static str),
    /// Inline (`--`) or block (`/*`, `*/`) comment marker.
    Comment,
    /// Extended or system procedure prefix (`xp_`, `sp_`).
    ProcedurePrefix,
    /// Content after a statement terminator.
    MultipleStatements,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty query"),
            Self::NotReadOnly => write!(f, "only SELECT or WITH queries are allowed"),
            Self::ForbiddenKeyword(kw) => write!(f, "forbidden keyword {kw}"),
            Self::Comment => write!(f, "SQL comments are not allowed"),
            Self::ProcedurePrefix => write!(f, "procedure calls are not allowed"),
            Self::MultipleStatements => write!(f, "multiple statements are not allowed"),
        }
    }
}
