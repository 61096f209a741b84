//! Error types for citeset
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Retry classification for the fetcher
//! - Fatal/non-fatal classification for the CLI
//! - Error codes for machine-readable diagnostics

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    MalformedInput,

    // Resource errors (4xxx)
    IdentifierNotFound,

    // External service errors (8xxx)
    TransientFetch,
    UpstreamError,
    HttpClientError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
    IoError,
    CsvError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::MalformedInput => 1001,

            ErrorCode::IdentifierNotFound => 4001,

            ErrorCode::TransientFetch => 8001,
            ErrorCode::UpstreamError => 8002,
            ErrorCode::HttpClientError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
            ErrorCode::IoError => 9004,
            ErrorCode::CsvError => 9005,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    // Resource errors
    #[error("Identifier not found: {id}")]
    IdentifierNotFound { id: String },

    // External service errors
    #[error("Transient fetch error from {source_name}: {message}")]
    TransientFetch { source_name: String, message: String },

    #[error("Upstream error from {source_name}: {message}")]
    Upstream { source_name: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a malformed input error
    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::MalformedInput { message: message.into() }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::MalformedInput { .. } => ErrorCode::MalformedInput,
            AppError::IdentifierNotFound { .. } => ErrorCode::IdentifierNotFound,
            AppError::TransientFetch { .. } => ErrorCode::TransientFetch,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::HttpClient(_) => ErrorCode::HttpClientError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Io { .. } => ErrorCode::IoError,
            AppError::Csv(_) => ErrorCode::CsvError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the fetcher should retry the failed operation
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransientFetch { .. } => true,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether this error must abort the run
    ///
    /// Missing identifiers and upstream trouble are recorded per seed and
    /// never stop the pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::IdentifierNotFound { .. }
                | AppError::TransientFetch { .. }
                | AppError::Upstream { .. }
                | AppError::HttpClient(_)
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
