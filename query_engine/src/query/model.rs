// query_engine/src/query/model.rs
//! The declarative query model: immutable value types deserialized from
//! the JSON query envelope. Built once per request, used for exactly one
//! evaluation, then discarded.

use std::collections::BTreeMap;

use models::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level `find` discriminator. `"relationships"` is accepted as an
/// alias for `"edges"` on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindKind {
    Nodes,
    #[serde(alias = "relationships")]
    Edges,
    Paths,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    #[default]
    Eq,
    Ne,
    In,
    Contains,
    Regex,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One property filter: dotted field reference, operator, comparison value.
#[derive(Clone, Debug, Deserialize)]
pub struct PropertyFilter {
    pub field: String,
    #[serde(default)]
    pub operator: FilterOp,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NodePattern {
    pub node_type: Option<String>,
    #[serde(default)]
    pub node_types: Vec<String>,
    /// Case-insensitive exact name match.
    pub name: Option<String>,
    /// Case-insensitive regex over the name.
    pub name_pattern: Option<String>,
    #[serde(default)]
    pub property_filters: Vec<PropertyFilter>,
    pub var: Option<String>,
    /// Pre-computed query embedding; compiles to a vector-distance
    /// predicate on the SQL backend.
    pub vector_search: Option<Vec<f32>>,
    pub similarity_threshold: Option<f64>,
}

impl NodePattern {
    pub fn var_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.var.as_deref().unwrap_or(default)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EdgePattern {
    pub relation_type: Option<String>,
    #[serde(default)]
    pub relation_types: Vec<String>,
    #[serde(default)]
    pub direction: Direction,
    pub min_confidence: Option<f64>,
    pub var: Option<String>,
}

impl EdgePattern {
    pub fn var_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.var.as_deref().unwrap_or(default)
    }
}

/// One hop of a path pattern: an edge constraint followed by the
/// constraint on the node reached via that edge.
///
/// Accepts either the two-element array form `[edge, node]` or the
/// object form `{"edge": …, "node": …}`; anything else fails
/// deserialization and surfaces as a malformed-query error.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "HopRepr")]
pub struct Hop {
    pub edge: EdgePattern,
    pub node: NodePattern,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HopRepr {
    Pair(EdgePattern, NodePattern),
    Tagged { edge: EdgePattern, node: NodePattern },
}

impl From<HopRepr> for Hop {
    fn from(repr: HopRepr) -> Self {
        match repr {
            HopRepr::Pair(edge, node) => Hop { edge, node },
            HopRepr::Tagged { edge, node } => Hop { edge, node },
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct PathPattern {
    pub start: NodePattern,
    #[serde(default)]
    pub edges: Vec<Hop>,
    /// Bounds traversal depth; defaults to the declared hop count and
    /// must never exceed it.
    pub max_hops: Option<usize>,
    #[serde(default = "default_true")]
    pub avoid_cycles: bool,
}

impl PathPattern {
    /// The hop bound actually used during traversal/compilation.
    pub fn effective_max_hops(&self) -> usize {
        self.max_hops.unwrap_or(self.edges.len()).min(self.edges.len())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggFunc {
    Count,
    Avg,
    Sum,
    Min,
    Max,
}

/// A named aggregation expression, written on the wire as
/// `["count", "treatment.evidence.paper_id"]`.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "(AggFunc, String)")]
pub struct Aggregation {
    pub func: AggFunc,
    pub field: String,
}

impl From<(AggFunc, String)> for Aggregation {
    fn from((func, field): (AggFunc, String)) -> Self {
        Aggregation { func, field }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AggregationSpec {
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregations: BTreeMap<String, Aggregation>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One ordering key, written on the wire as `["field", "desc"]` or
/// `["field"]` (direction defaults to ascending).
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "OrderSpecRepr")]
pub struct OrderSpec {
    pub field: String,
    pub direction: SortDirection,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OrderSpecRepr {
    Pair(String, SortDirection),
    Single([String; 1]),
}

impl From<OrderSpecRepr> for OrderSpec {
    fn from(repr: OrderSpecRepr) -> Self {
        match repr {
            OrderSpecRepr::Pair(field, direction) => OrderSpec { field, direction },
            OrderSpecRepr::Single([field]) => OrderSpec {
                field,
                direction: SortDirection::Asc,
            },
        }
    }
}

fn default_top_k() -> usize {
    10
}

/// Top-level semantic lookup bypassing pattern matching. Either `text`
/// (embedded via the injected provider) or a raw `vector` must be given.
#[derive(Clone, Debug, Deserialize)]
pub struct VectorSearch {
    pub text: Option<String>,
    pub vector: Option<Vec<f32>>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_similarity: f64,
}

/// The full query envelope.
#[derive(Clone, Debug, Deserialize)]
pub struct Query {
    pub find: FindKind,
    pub node_pattern: Option<NodePattern>,
    pub edge_pattern: Option<EdgePattern>,
    pub path_pattern: Option<PathPattern>,
    #[serde(default)]
    pub filters: Vec<PropertyFilter>,
    pub aggregate: Option<AggregationSpec>,
    #[serde(default)]
    pub order_by: Vec<OrderSpec>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub return_fields: Option<Vec<String>>,
    pub vector_search: Option<VectorSearch>,
}

impl Query {
    /// Parse and validate one request envelope.
    pub fn from_value(value: Value) -> GraphResult<Query> {
        let query: Query = serde_json::from_value(value)
            .map_err(|e| GraphError::InvalidQuery(e.to_string()))?;
        query.validate()?;
        Ok(query)
    }

    /// Structural checks that must hold before any evaluation starts.
    fn validate(&self) -> GraphResult<()> {
        if let Some(path) = &self.path_pattern {
            if let Some(max_hops) = path.max_hops {
                if max_hops > path.edges.len() {
                    return Err(GraphError::InvalidQuery(format!(
                        "max_hops ({}) exceeds the declared hop count ({})",
                        max_hops,
                        path.edges.len()
                    )));
                }
            }
        }
        if let Some(vs) = &self.vector_search {
            if vs.text.is_none() && vs.vector.is_none() {
                return Err(GraphError::InvalidQuery(
                    "vector_search requires either text or vector".to_string(),
                ));
            }
        }
        Ok(())
    }
}
