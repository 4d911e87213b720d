// query_engine/src/query/mod.rs

pub mod model;
pub mod resolver;

pub use model::{
    AggFunc, Aggregation, AggregationSpec, Direction, EdgePattern, FilterOp, FindKind, Hop,
    NodePattern, OrderSpec, PathPattern, PropertyFilter, Query, SortDirection, VectorSearch,
};
