//! Error types for spam-core

use thiserror::Error;

/// Main error type for the spam-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid discovery pattern
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// Logging setup failed
    #[error("logging error: {0}")]
    Logging(String),
}

/// Result type alias for spam-core
pub type Result<T> = std::result::Result<T, Error>;
