//! Error types for Sceneloop
//!
//! Centralized error handling using thiserror. Stage-local failures
//! (provider, host, parse) have their own enums next to the code that raises
//! them; this type unifies them for callers that cross layers.

use thiserror::Error;

use crate::artifact::ParseError;
use crate::host::HostError;
use crate::llm::ProviderError;

/// All error types that can escape a Sceneloop component
#[derive(Debug, Error)]
pub enum SceneloopError {
    /// Out-of-sequence append to context memory (caller bug)
    #[error("Invalid record: expected sequence number {expected}, got {actual}")]
    InvalidRecord { expected: u32, actual: u32 },

    /// Configuration problem detected at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model provider failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// External host failure
    #[error(transparent)]
    Host(#[from] HostError),

    /// Model text did not contain a parseable payload
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SceneloopError {
    /// Returns true for errors that must stop a run before or during startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, SceneloopError::InvalidRecord { .. } | SceneloopError::Config(_))
    }
}

/// Result type alias for Sceneloop operations
pub type Result<T> = std::result::Result<T, SceneloopError>;
