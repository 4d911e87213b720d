// query_engine/src/lib.rs
//! Declarative pattern-matching query engine for the medical-literature
//! knowledge graph. One query model, two backends: an in-memory graph
//! interpreter over a [`models::KnowledgeGraph`] snapshot and a SQL
//! compiler/executor targeting Postgres with pgvector.

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod embedding;
pub mod interpreter;
pub mod query;
pub mod sql;

pub use backend::{QueryBackend, Row};
pub use config::BackendConfig;
pub use dispatcher::Dispatcher;
pub use embedding::Embedder;
pub use interpreter::GraphInterpreter;
pub use query::Query;
pub use sql::{SqlBackend, SqlCompiler, SqlStatement};
