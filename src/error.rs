//! Error types for the Fortune API service.

use thiserror::Error;

/// Main error type for Fortune API operations.
#[derive(Error, Debug)]
pub enum FortuneError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The fortune command exited unsuccessfully
    #[error("fortune command failed: {status}")]
    CommandFailed {
        /// Exit status reported by the process
        status: std::process::ExitStatus,
        /// Combined stdout and stderr
        output: String,
    },

    /// The fortune command succeeded but printed nothing
    #[error("no fortune returned")]
    EmptyOutput,

    /// A search was requested without a pattern
    #[error("search pattern is required")]
    MissingPattern,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for FortuneError {
    fn from(err: config::ConfigError) -> Self {
        FortuneError::Config(err.to_string())
    }
}

/// Result type alias for Fortune API operations.
pub type Result<T> = std::result::Result<T, FortuneError>;
