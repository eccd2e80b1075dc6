//! Error types for the guard and sync engine.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur inside the decision engine.
///
/// Guard blocks and confirmation outcomes are not errors; they are values
/// ([`GuardResult`](crate::guard::GuardResult),
/// [`ConfirmationOutcome`](crate::confirm::ConfirmationOutcome)).
#[derive(Debug, Error)]
pub enum CoreError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The external migration tool could not be started or failed.
    #[error("Migration tool error: {0}")]
    Tool(String),

    /// A wildcard branch pattern could not be compiled.
    #[error("Invalid branch pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// Marking a remote migration as reverted failed.
    #[error("Failed to mark migration {timestamp} as reverted: {message}")]
    RepairFailed {
        /// Timestamp whose revert failed.
        timestamp: String,
        /// Timestamps already reverted before the failure, in order.
        reverted: Vec<String>,
        /// Failure detail.
        message: String,
    },

    /// A migration filename or timestamp was malformed.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Git inspection failure.
    #[error("Git error: {0}")]
    Git(String),
}

impl CoreError {
    /// Create a tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::Tool(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a git error.
    pub fn git(msg: impl Into<String>) -> Self {
        Self::Git(msg.into())
    }

    /// Timestamps successfully reverted before a repair failure.
    pub fn reverted_before_failure(&self) -> &[String] {
        match self {
            Self::RepairFailed { reverted, .. } => reverted,
            _ => &[],
        }
    }
}
