// models/src/errors.rs

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed query envelope, pattern shape, or reference.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Construct the active backend cannot express.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Generic storage-related error (failed statement, bad row shape).
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// Error during data serialization.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Embedding provider failure.
    #[error("Embedding error: {0}")]
    EmbeddingError(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::SerializationError(err.to_string())
    }
}

/// A type alias for a `Result` that returns a `GraphError` on failure.
pub type GraphResult<T> = Result<T, GraphError>;
