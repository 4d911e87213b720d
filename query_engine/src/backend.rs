// query_engine/src/backend.rs
//! The backend seam: one trait, two implementations (in-memory graph
//! interpreter and Postgres-backed SQL executor). The dispatcher only
//! ever talks to this trait.

use async_trait::async_trait;
use models::GraphResult;
use serde_json::{Map, Value};

use crate::query::Query;

/// One result row: dotted field references mapped to JSON values.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Short backend name, used in log lines.
    fn name(&self) -> &'static str;

    /// Evaluate one validated query to its result rows.
    async fn execute(&self, query: &Query) -> GraphResult<Vec<Row>>;
}
