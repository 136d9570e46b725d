//! Error types for the caprock_core library.

use std::io;
use std::path::PathBuf;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for caprock_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad input shape or bounds (name length, ABV range, volume increment)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Deletion blocked by a live reference or container assignment
    #[error("Constraint error: {0}")]
    Constraint(String),

    /// Not enough liquid left to satisfy a draw
    #[error("Insufficient volume of {liquid}: requested {requested} oz, {remaining} oz remaining")]
    InsufficientVolume {
        liquid: String,
        requested: f64,
        remaining: f64,
    },

    /// Named entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A registry or drink is already at its configured maximum
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// The data directory is missing at load time
    #[error("Storage directory {0:?} does not exist")]
    StorageUnavailable(PathBuf),

    /// A storage stream could not be parsed
    #[error("Malformed storage at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}
