//! CLI error types

use civic_authority::AuthorityError;
use civic_gate::GateError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A log line that is not JSON
    #[error("{path}:{line}: {source}")]
    LogLine {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Authority error: {0}")]
    Authority(#[from] AuthorityError),

    #[error("Kernel error: {0}")]
    Gate(#[from] GateError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
