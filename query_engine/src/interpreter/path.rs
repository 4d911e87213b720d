// query_engine/src/interpreter/path.rs
//! Multi-hop path traversal. Depth-first over the outgoing adjacency
//! index, one hop spec per level; `avoid_cycles` keeps paths simple by
//! pruning any edge that would revisit a node already on the path.

use log::debug;
use models::{Entity, GraphError, GraphResult, KnowledgeGraph, Relationship};
use serde_json::json;

use super::{matches_edge_pattern, matches_node_pattern, pipeline};
use crate::backend::Row;
use crate::interpreter::filters::apply_operator;
use crate::query::resolver::resolve_in_row;
use crate::query::{Hop, PathPattern, Query};

struct PathMatch<'g> {
    nodes: Vec<&'g Entity>,
    edges: Vec<&'g Relationship>,
}

pub(crate) fn path_query(graph: &KnowledgeGraph, query: &Query) -> GraphResult<Vec<Row>> {
    let pattern = match &query.path_pattern {
        Some(pattern) => pattern,
        None => {
            return Err(GraphError::InvalidQuery(
                "path query requires path_pattern".to_string(),
            ))
        }
    };
    // Validation already rejected max_hops above the declared count; a
    // smaller value truncates the hop chain.
    let hops = &pattern.edges[..pattern.effective_max_hops()];

    let mut paths = Vec::new();
    for entity in graph.entities() {
        if !matches_node_pattern(entity, &pattern.start) {
            continue;
        }
        let mut nodes = vec![entity];
        let mut edges = Vec::new();
        traverse(
            graph,
            entity,
            hops,
            0,
            pattern.avoid_cycles,
            &mut nodes,
            &mut edges,
            &mut paths,
        );
    }
    debug!("path query traversed {} complete paths", paths.len());

    let mut rows: Vec<Row> = paths
        .iter()
        .map(|path| flatten(path, pattern, hops))
        .collect();
    if !query.filters.is_empty() {
        rows.retain(|row| {
            query.filters.iter().all(|f| {
                apply_operator(resolve_in_row(row, &f.field).as_ref(), f.operator, &f.value)
            })
        });
    }
    Ok(pipeline::finish(rows, query))
}

#[allow(clippy::too_many_arguments)]
fn traverse<'g>(
    graph: &'g KnowledgeGraph,
    current: &'g Entity,
    hops: &[Hop],
    hop_index: usize,
    avoid_cycles: bool,
    nodes: &mut Vec<&'g Entity>,
    edges: &mut Vec<&'g Relationship>,
    paths: &mut Vec<PathMatch<'g>>,
) {
    if hop_index >= hops.len() {
        paths.push(PathMatch {
            nodes: nodes.clone(),
            edges: edges.clone(),
        });
        return;
    }
    let hop = &hops[hop_index];
    for rel in graph.outgoing(&current.id) {
        if !matches_edge_pattern(rel, &hop.edge) {
            continue;
        }
        let target = match graph.get_entity(&rel.object_id) {
            Some(target) => target,
            None => continue,
        };
        if !matches_node_pattern(target, &hop.node) {
            continue;
        }
        if avoid_cycles && nodes.iter().any(|n| n.id == target.id) {
            continue;
        }
        nodes.push(target);
        edges.push(rel);
        traverse(graph, target, hops, hop_index + 1, avoid_cycles, nodes, edges, paths);
        nodes.pop();
        edges.pop();
    }
}

/// Flatten a path into one row: each bound node contributes
/// `{var}.id`/`{var}.name`, each bound edge `{var}.relation_type`,
/// `{var}.confidence` and its one-level metadata keys. Default
/// variables are `start`, `edge{i}` and `node{i+1}`.
fn flatten(path: &PathMatch<'_>, pattern: &PathPattern, hops: &[Hop]) -> Row {
    let mut row = Row::new();
    emit_node(&mut row, pattern.start.var_or("start"), path.nodes[0]);

    for (i, hop) in hops.iter().enumerate() {
        if let Some(edge) = path.edges.get(i) {
            let default = format!("edge{i}");
            let edge_var = hop.edge.var_or(&default);
            row.insert(format!("{edge_var}.relation_type"), json!(edge.predicate));
            row.insert(format!("{edge_var}.confidence"), json!(edge.confidence));
            for (key, value) in &edge.metadata {
                row.insert(format!("{edge_var}.{key}"), value.clone());
            }
        }
        if let Some(node) = path.nodes.get(i + 1) {
            let default = format!("node{}", i + 1);
            emit_node(&mut row, hop.node.var_or(&default), node);
        }
    }
    row
}

fn emit_node(row: &mut Row, var: &str, entity: &Entity) {
    row.insert(format!("{var}.id"), json!(entity.id));
    row.insert(format!("{var}.name"), json!(entity.name));
}
