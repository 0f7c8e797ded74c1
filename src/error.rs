//! Error types for capability loading and terminal output

use std::io;
use thiserror::Error;

/// Rendering core error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Terminal type is neither a preset nor a readable file
    #[error("Unknown terminal type: {0}")]
    UnknownTerminal(String),

    /// Capability template fails to expand
    #[error("Invalid capability {field} in '{name}': {reason}")]
    Capability {
        name: String,
        field: String,
        reason: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type for rendering core operations
pub type Result<T> = std::result::Result<T, Error>;
