// query_engine/src/query/resolver.rs
//! Field-reference resolution: dotted references like `drug.name`,
//! `target.node_type` or `treatment.evidence.paper_id` resolved against
//! the bindings of one match. Shared by the interpreter's filters and
//! aggregations and (as the splitting/alias rules) by the SQL compiler,
//! so filter semantics stay identical across backends.

use models::{Entity, Relationship};
use serde_json::{Map, Value};

/// Split a dotted reference into (binding segment, attribute path).
/// `None` for the binding means the reference had no dot.
pub fn split_field(field: &str) -> (Option<&str>, &str) {
    match field.split_once('.') {
        Some((head, rest)) => (Some(head), rest),
        None => (None, field),
    }
}

/// The bindings produced by matching one (source, edge, target) triple.
pub struct Bindings<'a> {
    pub source: &'a Entity,
    pub edge: &'a Relationship,
    pub target: &'a Entity,
    pub source_var: &'a str,
    pub edge_var: &'a str,
}

impl<'a> Bindings<'a> {
    /// Resolve a dotted reference to the scalar at that path, or `None`
    /// if unresolved.
    ///
    /// The first segment selects a binding: the source or edge pattern
    /// variable, or one of the reserved names `source`/`subject`,
    /// `target`/`object`, `edge`. Unknown first segments fall back to
    /// attribute lookup against the source binding (permissive default,
    /// not an error). Bare references consult target, then edge, then
    /// source.
    pub fn resolve(&self, field: &str) -> Option<Value> {
        let (head, path) = split_field(field);
        match head {
            None => self
                .target
                .attribute(path)
                .or_else(|| self.edge.attribute(path))
                .or_else(|| self.source.attribute(path)),
            Some(var) if var == self.edge_var || var == "edge" => {
                resolve_path(|attr| self.edge.attribute(attr), path)
            }
            Some("target") | Some("object") => resolve_path(|attr| self.target.attribute(attr), path),
            Some(var) if var == self.source_var || var == "source" || var == "subject" => {
                resolve_path(|attr| self.source.attribute(attr), path)
            }
            Some(_) => resolve_path(|attr| self.source.attribute(attr), path),
        }
    }
}

/// Resolve the attribute path against a binding: the first segment is an
/// attribute lookup, any further segments descend into JSON objects.
pub(crate) fn resolve_path(
    attribute: impl Fn(&str) -> Option<Value>,
    path: &str,
) -> Option<Value> {
    let (attr, rest) = match path.split_once('.') {
        Some((attr, rest)) => (attr, Some(rest)),
        None => (path, None),
    };
    let mut value = attribute(attr)?;
    if let Some(rest) = rest {
        for segment in rest.split('.') {
            value = value.get(segment)?.clone();
        }
    }
    Some(value)
}

/// Resolve a reference against an already-flattened result row (path
/// queries filter on the flattened representation by exact key).
pub fn resolve_in_row(row: &Map<String, Value>, field: &str) -> Option<Value> {
    row.get(field).cloned()
}
