use std::path::PathBuf;

use thiserror::Error;

use crate::llm::LlmError;

/// Errors from chat-transport operations (send, edit, polling).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(String),

    #[error("api error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors surfaced by one response cycle.
///
/// Only the engine-call failure escapes a cycle; fragment-read failures and
/// transport failures are absorbed inside the cycle.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("completion engine call failed: {0}")]
    Engine(#[from] LlmError),
}

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}
