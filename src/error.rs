//! Error types for the zennas search engine

use thiserror::Error;

/// Result type alias for zennas operations
pub type Result<T> = std::result::Result<T, ZennasError>;

/// Main error type for the search engine.
///
/// Per-candidate conditions (budget rejections) are not errors; they are
/// modeled as [`crate::budget::Feasibility`] values. Only failures that a
/// caller must react to appear here.
#[derive(Error, Debug)]
pub enum ZennasError {
    #[error("malformed structure: {0}")]
    MalformedStructure(String),

    #[error("score unavailable for candidate: {0}")]
    ScoreUnavailable(String),

    #[error("search space exhausted after {attempts} seeding attempts")]
    SearchSpaceExhausted { attempts: usize },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ZennasError {
    fn from(err: serde_json::Error) -> Self {
        ZennasError::SerializationError(err.to_string())
    }
}
