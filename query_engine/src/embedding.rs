// query_engine/src/embedding.rs
//! Embedding seam for semantic search. The engine never talks to a
//! model directly; the SQL backend is handed an `Embedder` at
//! construction, so deployments choose the provider (and tests inject
//! a deterministic one).

use async_trait::async_trait;
use models::GraphResult;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one query text into the vector space the `entities`
    /// embeddings were produced in. The dimension must match the
    /// backend's configured `embedding_dim`.
    async fn embed(&self, text: &str) -> GraphResult<Vec<f32>>;
}
