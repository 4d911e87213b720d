// query_engine/src/interpreter/mod.rs
//! In-memory query evaluation over a `KnowledgeGraph` snapshot.
//!
//! Node and edge queries share one pipeline: match patterns into
//! (source, edge, target) triples, apply filters conjunctively, then
//! aggregate / order / paginate / project. Path queries live in
//! [`path`]; vector search needs stored embeddings and is only
//! available on the SQL backend.

pub mod aggregate;
pub mod filters;
pub mod path;
pub mod pipeline;

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use models::{Entity, GraphError, GraphResult, KnowledgeGraph, Relationship};
use serde_json::json;

use crate::backend::{QueryBackend, Row};
use crate::query::resolver::{self, Bindings};
use crate::query::{Direction, EdgePattern, FindKind, NodePattern, PropertyFilter, Query};
use filters::{apply_operator, regex_matches};

/// One matched (source, edge, target) triple. For edge queries the
/// source/target are the subject/object of the relationship itself.
pub(crate) struct TripleMatch<'g> {
    pub source: &'g Entity,
    pub edge: &'g Relationship,
    pub target: &'g Entity,
}

impl<'g> TripleMatch<'g> {
    pub(crate) fn bindings<'a>(&'a self, source_var: &'a str, edge_var: &'a str) -> Bindings<'a> {
        Bindings {
            source: self.source,
            edge: self.edge,
            target: self.target,
            source_var,
            edge_var,
        }
    }
}

/// Evaluates queries against an immutable snapshot. Cheap to clone and
/// share across tasks; never mutates the graph.
#[derive(Clone)]
pub struct GraphInterpreter {
    graph: Arc<KnowledgeGraph>,
}

impl GraphInterpreter {
    pub fn new(graph: Arc<KnowledgeGraph>) -> Self {
        GraphInterpreter { graph }
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    fn run(&self, query: &Query) -> GraphResult<Vec<Row>> {
        if query.vector_search.is_some()
            || query
                .node_pattern
                .as_ref()
                .is_some_and(|p| p.vector_search.is_some())
        {
            return Err(GraphError::Unsupported(
                "vector search requires the SQL backend".to_string(),
            ));
        }
        match query.find {
            FindKind::Nodes => self.node_query(query),
            FindKind::Edges => self.edge_query(query),
            FindKind::Paths => path::path_query(&self.graph, query),
        }
    }

    fn node_query(&self, query: &Query) -> GraphResult<Vec<Row>> {
        let node_pattern = query.node_pattern.clone().unwrap_or_default();
        let edge_pattern = query.edge_pattern.clone().unwrap_or_default();
        let source_var = node_pattern.var_or("node");
        let edge_var = edge_pattern.var_or("edge");

        let mut matches = Vec::new();
        for entity in self.graph.entities() {
            if !matches_node_pattern(entity, &node_pattern) {
                continue;
            }
            for (edge, other_id) in edges_for(&self.graph, &entity.id, edge_pattern.direction) {
                if !matches_edge_pattern(edge, &edge_pattern) {
                    continue;
                }
                let target = match self.graph.get_entity(other_id) {
                    Some(target) => target,
                    None => continue,
                };
                let triple = TripleMatch {
                    source: entity,
                    edge,
                    target,
                };
                if !passes_filters(&triple.bindings(source_var, edge_var), &query.filters) {
                    continue;
                }
                matches.push(triple);
            }
        }
        debug!("node query matched {} triples", matches.len());

        let rows = if let Some(spec) = &query.aggregate {
            aggregate::aggregate_matches(&matches, spec, source_var, edge_var)
        } else {
            matches
                .iter()
                .map(|m| {
                    let mut row = Row::new();
                    row.insert(format!("{source_var}.name"), json!(m.source.name));
                    row.insert(format!("{source_var}.id"), json!(m.source.id));
                    row
                })
                .collect()
        };
        Ok(pipeline::finish(rows, query))
    }

    fn edge_query(&self, query: &Query) -> GraphResult<Vec<Row>> {
        let node_pattern = query.node_pattern.clone().unwrap_or_default();
        let edge_pattern = query.edge_pattern.clone().unwrap_or_default();
        let source_var = node_pattern.var_or("node");
        let edge_var = edge_pattern.var_or("edge");

        let mut matches = Vec::new();
        for edge in self.graph.relationships() {
            if !matches_edge_pattern(edge, &edge_pattern) {
                continue;
            }
            let (subject, object) = match (
                self.graph.get_entity(&edge.subject_id),
                self.graph.get_entity(&edge.object_id),
            ) {
                (Some(subject), Some(object)) => (subject, object),
                _ => continue,
            };
            // A node pattern on an edge query constrains the subject.
            if !matches_node_pattern(subject, &node_pattern) {
                continue;
            }
            let triple = TripleMatch {
                source: subject,
                edge,
                target: object,
            };
            if !passes_filters(&triple.bindings(source_var, edge_var), &query.filters) {
                continue;
            }
            matches.push(triple);
        }
        debug!("edge query matched {} relationships", matches.len());

        let rows = if let Some(spec) = &query.aggregate {
            aggregate::aggregate_matches(&matches, spec, source_var, edge_var)
        } else {
            matches.iter().map(|m| edge_row(m)).collect()
        };
        Ok(pipeline::finish(rows, query))
    }
}

#[async_trait]
impl QueryBackend for GraphInterpreter {
    fn name(&self) -> &'static str {
        "graph"
    }

    async fn execute(&self, query: &Query) -> GraphResult<Vec<Row>> {
        self.run(query)
    }
}

fn edge_row(m: &TripleMatch<'_>) -> Row {
    let mut row = Row::new();
    row.insert("subject.name".to_string(), json!(m.source.name));
    row.insert("subject.id".to_string(), json!(m.source.id));
    row.insert("subject.type".to_string(), json!(m.source.entity_type.as_str()));
    row.insert("predicate".to_string(), json!(m.edge.predicate));
    row.insert("object.name".to_string(), json!(m.target.name));
    row.insert("object.id".to_string(), json!(m.target.id));
    row.insert("object.type".to_string(), json!(m.target.entity_type.as_str()));
    row.insert("confidence".to_string(), json!(m.edge.confidence));
    row.insert("evidence_count".to_string(), json!(m.edge.evidence_count));
    row.insert("papers".to_string(), json!(m.edge.papers));
    row
}

/// Enumerate the edges incident to `id` per the requested direction,
/// paired with the id of the opposite endpoint.
fn edges_for<'g>(
    graph: &'g KnowledgeGraph,
    id: &str,
    direction: Direction,
) -> Vec<(&'g Relationship, &'g str)> {
    let outgoing = graph.outgoing(id).map(|r| (r, r.object_id.as_str()));
    let incoming = graph.incoming(id).map(|r| (r, r.subject_id.as_str()));
    match direction {
        Direction::Outgoing => outgoing.collect(),
        Direction::Incoming => incoming.collect(),
        Direction::Both => outgoing.chain(incoming).collect(),
    }
}

pub(crate) fn matches_node_pattern(entity: &Entity, pattern: &NodePattern) -> bool {
    if let Some(node_type) = &pattern.node_type {
        if entity.entity_type.as_str() != node_type {
            return false;
        }
    }
    if !pattern.node_types.is_empty()
        && !pattern
            .node_types
            .iter()
            .any(|t| entity.entity_type.as_str() == t)
    {
        return false;
    }
    if let Some(name) = &pattern.name {
        if !entity.name.eq_ignore_ascii_case(name) {
            return false;
        }
    }
    if let Some(name_pattern) = &pattern.name_pattern {
        if !regex_matches(name_pattern, &entity.name) {
            return false;
        }
    }
    let var = pattern.var_or("node");
    pattern.property_filters.iter().all(|f| {
        let actual = resolver::resolve_path(|a| entity.attribute(a), inline_filter_path(f, var));
        apply_operator(actual.as_ref(), f.operator, &f.value)
    })
}

/// Inline node-pattern filters refer to the pattern's own entity; a
/// leading pattern variable or reserved binding name is redundant and
/// gets stripped before attribute lookup.
fn inline_filter_path<'a>(filter: &'a PropertyFilter, var: &str) -> &'a str {
    match resolver::split_field(&filter.field) {
        (Some(head), rest)
            if head == var
                || matches!(head, "node" | "source" | "subject" | "target" | "object") =>
        {
            rest
        }
        _ => filter.field.as_str(),
    }
}

pub(crate) fn matches_edge_pattern(edge: &Relationship, pattern: &EdgePattern) -> bool {
    if let Some(relation_type) = &pattern.relation_type {
        if !edge.predicate_matches(relation_type) {
            return false;
        }
    }
    if !pattern.relation_types.is_empty()
        && !pattern.relation_types.iter().any(|t| edge.predicate_matches(t))
    {
        return false;
    }
    if let Some(min_confidence) = pattern.min_confidence {
        if edge.confidence < min_confidence {
            return false;
        }
    }
    true
}

fn passes_filters(bindings: &Bindings<'_>, filters: &[PropertyFilter]) -> bool {
    filters.iter().all(|f| {
        apply_operator(bindings.resolve(&f.field).as_ref(), f.operator, &f.value)
    })
}
