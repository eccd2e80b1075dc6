//! CLI error types and result alias.

use std::path::Path;

use dbguard_core::CoreError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
///
/// Every variant ends the process with exit code 1.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(dbguard::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error in {path}: {message}")]
    #[diagnostic(code(dbguard::config), help("Fix the file or run `dbguard init`"))]
    Config {
        /// Offending file.
        path: String,
        /// Field-level detail.
        message: String,
    },

    /// A guard blocked the operation
    #[error("Blocked: {0}")]
    #[diagnostic(code(dbguard::blocked))]
    Blocked(String),

    /// The user (or CI policy) declined
    #[error("Declined: {0}")]
    #[diagnostic(code(dbguard::declined))]
    Declined(String),

    /// The user cancelled a prompt
    #[error("Cancelled")]
    #[diagnostic(code(dbguard::cancelled))]
    Cancelled,

    /// Migration repair failed
    #[error("Repair failed: {0}")]
    #[diagnostic(code(dbguard::repair))]
    Repair(String),

    /// External migration tool error
    #[error("Migration tool error: {0}")]
    #[diagnostic(code(dbguard::tool))]
    Tool(String),

    /// Command error
    #[error("Command error: {0}")]
    #[diagnostic(code(dbguard::command))]
    Command(String),
}

impl CliError {
    /// Create a configuration error for `path`.
    pub fn config(path: &Path, message: impl Into<String>) -> Self {
        CliError::Config {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => CliError::Io(e),
            e @ CoreError::RepairFailed { .. } => CliError::Repair(e.to_string()),
            other => CliError::Tool(other.to_string()),
        }
    }
}
