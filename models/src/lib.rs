// models/src/lib.rs
//! Domain value types for the medical-literature knowledge graph:
//! entities, relationships, the immutable in-memory snapshot, and the
//! shared error type.

pub mod entities;
pub mod errors;
pub mod graph;
pub mod relationships;

pub use entities::{Entity, EntityType};
pub use errors::{GraphError, GraphResult};
pub use graph::KnowledgeGraph;
pub use relationships::Relationship;
