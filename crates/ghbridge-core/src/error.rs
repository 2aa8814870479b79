//! Error types for ghbridge.

use std::time::Duration;

use thiserror::Error;

/// Main error type for ghbridge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Required configuration or credential is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker process failed to spawn or failed the handshake
    #[error("Startup error: {0}")]
    Startup(String),

    /// Write, read, or framing failure against a running worker
    #[error("Transport error: {0}")]
    Transport(String),

    /// The worker produced no response line before the read deadline
    #[error("Timed out after {0:?} waiting for MCP server response")]
    Timeout(Duration),

    /// The worker answered with a JSON-RPC error envelope
    #[error("MCP Error {code}: {message}")]
    Protocol { code: i64, message: String },

    /// Termination or container cleanup failed
    #[error("Teardown error: {0}")]
    Teardown(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Whether the fault leaves the worker's stdout stream in an unknown
    /// position, so the next response line can no longer be trusted.
    pub fn poisons_stream(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

/// Result type alias for ghbridge operations.
pub type Result<T> = std::result::Result<T, Error>;
