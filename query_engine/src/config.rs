// query_engine/src/config.rs

use models::{GraphError, GraphResult};

pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Connection settings for the SQL backend.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub connection_string: String,
    /// Dimension of the `entities.embedding` column.
    pub embedding_dim: usize,
}

impl BackendConfig {
    pub fn new(connection_string: impl Into<String>) -> Self {
        BackendConfig {
            connection_string: connection_string.into(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }

    /// Read the connection string from `DATABASE_URL`.
    pub fn from_env() -> GraphResult<Self> {
        let connection_string = std::env::var("DATABASE_URL").map_err(|_| {
            GraphError::ConnectionError("DATABASE_URL is not set".to_string())
        })?;
        Ok(BackendConfig::new(connection_string))
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }
}
