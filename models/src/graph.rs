// models/src/graph.rs
//! Immutable in-memory snapshot of the knowledge graph with adjacency
//! indexes. Rebuilt wholesale when the underlying store changes; the
//! query engine only ever reads it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::info;

use crate::entities::Entity;
use crate::relationships::Relationship;

pub struct KnowledgeGraph {
    entities: HashMap<String, Entity>,
    relationships: Vec<Relationship>,
    // Indexes into `relationships`, keyed by entity id.
    out_edges: HashMap<String, Vec<usize>>,
    in_edges: HashMap<String, Vec<usize>>,
    built_at: DateTime<Utc>,
}

impl KnowledgeGraph {
    pub fn new(
        entities: impl IntoIterator<Item = Entity>,
        relationships: Vec<Relationship>,
    ) -> Self {
        let entities: HashMap<String, Entity> =
            entities.into_iter().map(|e| (e.id.clone(), e)).collect();

        let mut out_edges: HashMap<String, Vec<usize>> = HashMap::new();
        let mut in_edges: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, rel) in relationships.iter().enumerate() {
            out_edges.entry(rel.subject_id.clone()).or_default().push(idx);
            in_edges.entry(rel.object_id.clone()).or_default().push(idx);
        }

        let graph = KnowledgeGraph {
            entities,
            relationships,
            out_edges,
            in_edges,
            built_at: Utc::now(),
        };
        info!(
            "built knowledge graph snapshot: {} entities, {} relationships",
            graph.entities.len(),
            graph.relationships.len()
        );
        graph
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Relationships where `id` is the subject.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Relationship> {
        self.out_edges
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.relationships[idx])
    }

    /// Relationships where `id` is the object.
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &Relationship> {
        self.in_edges
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.relationships[idx])
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntityType;

    fn sample() -> KnowledgeGraph {
        let entities = vec![
            Entity::new("d1", EntityType::Drug, "metformin"),
            Entity::new("p1", EntityType::Protein, "AMPK"),
            Entity::new("g1", EntityType::Gene, "PRKAA1"),
        ];
        let relationships = vec![
            Relationship::new("d1", "ACTIVATES", "p1"),
            Relationship::new("p1", "ENCODED_BY", "g1"),
        ];
        KnowledgeGraph::new(entities, relationships)
    }

    #[test]
    fn test_adjacency_indexes() {
        let graph = sample();
        let out: Vec<_> = graph.outgoing("d1").collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].object_id, "p1");

        let inc: Vec<_> = graph.incoming("g1").collect();
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].subject_id, "p1");

        assert!(graph.outgoing("g1").next().is_none());
    }

    #[test]
    fn test_lookup_and_counts() {
        let graph = sample();
        assert_eq!(graph.entity_count(), 3);
        assert_eq!(graph.relationship_count(), 2);
        assert_eq!(graph.get_entity("p1").unwrap().name, "AMPK");
        assert!(graph.get_entity("nope").is_none());
    }
}
