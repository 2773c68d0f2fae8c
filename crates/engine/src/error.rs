//! Errors that stop the engine from running at all.
//!
//! "Nothing matched" is never an error: matching returns `Ok(None)` and
//! detection returns an empty list. These variants cover unusable
//! configuration and broken caller preconditions only.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid rule {id}: {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("Duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("Invalid merchant alias entry {id}: {reason}")]
    InvalidAlias { id: String, reason: String },

    #[error("Duplicate recurring pattern id: {0}")]
    DuplicatePattern(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transaction {0} appears more than once in the pool")]
    DuplicateTransaction(String),
}

impl EngineError {
    /// Whether the error comes from the caller's inputs to a single call
    /// rather than from loaded configuration.
    pub fn is_precondition(&self) -> bool {
        matches!(self, EngineError::DuplicateTransaction(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
