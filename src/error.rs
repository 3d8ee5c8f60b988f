//! Error types for QueryMend.
//!
//! Defines the main error enum used throughout the application, plus the
//! narrower `GeneratorError` reported by text generation backends.

use thiserror::Error;

/// Failure reported by a text generation backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// Provider rejected the request because of rate limits or quota.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// API key missing, invalid or unauthorized.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Provider refused to answer because of its content filters.
    #[error("Content blocked: {0}")]
    ContentBlocked(String),

    /// Network failure, unexpected status or unreadable payload.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl GeneratorError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Transport(_) | Self::Timeout(_)
        )
    }
}

/// Main error type for QueryMend operations.
#[derive(Error, Debug)]
pub enum QueryMendError {
    /// Candidate SQL failed the safety validator.
    #[error("Validation rejected: {0}")]
    ValidationRejected(String),

    /// Generator output did not contain a usable SQL block.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// What was wrong with the response.
        reason: String,
        /// The raw generator text, kept for diagnostics.
        raw: String,
    },

    /// Backend reported an error while running a statement.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Debug attempts were consumed without a successful execution.
    #[error("Failed to execute SQL after {attempts} attempts. Last error: {last_error}")]
    BudgetExhausted { attempts: u32, last_error: String },

    /// Text generation backend failed.
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// Requested data source is not configured.
    #[error("Data source '{0}' not found")]
    SourceNotFound(String),

    /// Could not connect to or introspect a data source.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryMendError {
    /// Creates a malformed-response error carrying the raw text.
    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ValidationRejected(_) => "Validation Error",
            Self::MalformedResponse { .. } => "Response Error",
            Self::Execution(_) => "Execution Error",
            Self::BudgetExhausted { .. } => "Budget Exhausted",
            Self::Generator(_) => "Generator Error",
            Self::SourceNotFound(_) => "Source Error",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using QueryMendError.
pub type Result<T> = std::result::Result<T, QueryMendError>;
