//! Error types for rule configuration and evaluation

use thiserror::Error;

/// Errors raised while building or running the rule engine
///
/// Evaluation itself never rejects SQL through this type: a statement that breaks
/// a rule is reported as a [`crate::Violation`]. These errors cover configuration
/// that cannot be honoured and checker-internal failures.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Wildcard pattern did not compile
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// SQL text was empty or whitespace only
    #[error("SQL statement is empty")]
    EmptySql,

    /// A checker failed internally while evaluating a statement
    #[error("Checker '{checker}' failed: {message}")]
    Checker { checker: String, message: String },

    /// JSON configuration could not be decoded
    #[error("Config decode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GuardError {
    /// Shorthand for [`GuardError::InvalidConfig`]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Shorthand for [`GuardError::Checker`]
    pub fn checker(checker: &str, message: impl Into<String>) -> Self {
        Self::Checker {
            checker: checker.to_string(),
            message: message.into(),
        }
    }
}
