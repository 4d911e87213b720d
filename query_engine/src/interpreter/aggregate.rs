// query_engine/src/interpreter/aggregate.rs
//! Grouping and aggregate functions over matched triples.
//!
//! Group keys are the canonical JSON encoding of the resolved
//! `group_by` values, but result rows carry the resolved values
//! themselves, so typed values survive into the envelope. `count` has
//! domain-specific cardinality: counting evidence paper references
//! counts supporting papers, not matches.

use std::collections::HashMap;

use serde_json::{json, Value};

use super::pipeline::cmp_values;
use super::TripleMatch;
use crate::backend::Row;
use crate::query::{AggFunc, AggregationSpec};

pub(crate) fn aggregate_matches(
    matches: &[TripleMatch<'_>],
    spec: &AggregationSpec,
    source_var: &str,
    edge_var: &str,
) -> Vec<Row> {
    // Group by canonical key, preserving first-seen group order.
    let mut group_order: Vec<Vec<String>> = Vec::new();
    let mut groups: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
    for (idx, m) in matches.iter().enumerate() {
        let bindings = m.bindings(source_var, edge_var);
        let key: Vec<String> = spec
            .group_by
            .iter()
            .map(|field| canonical_key(bindings.resolve(field)))
            .collect();
        groups
            .entry(key)
            .or_insert_with_key(|key| {
                group_order.push(key.clone());
                Vec::new()
            })
            .push(idx);
    }

    group_order
        .iter()
        .map(|key| {
            let members = &groups[key];
            let mut row = Row::new();

            // Group fields resolve against the group's first member.
            let first = &matches[members[0]];
            let bindings = first.bindings(source_var, edge_var);
            for field in &spec.group_by {
                row.insert(
                    field.clone(),
                    bindings.resolve(field).unwrap_or(Value::Null),
                );
            }

            for (name, agg) in &spec.aggregations {
                let value = match agg.func {
                    AggFunc::Count => compute_count(matches, members, &agg.field),
                    AggFunc::Avg => compute_avg(matches, members, &agg.field, source_var, edge_var),
                    AggFunc::Sum => compute_sum(matches, members, &agg.field, source_var, edge_var),
                    AggFunc::Min => {
                        compute_extreme(matches, members, &agg.field, source_var, edge_var, false)
                    }
                    AggFunc::Max => {
                        compute_extreme(matches, members, &agg.field, source_var, edge_var, true)
                    }
                };
                row.insert(name.clone(), value);
            }
            row
        })
        .collect()
}

fn canonical_key(value: Option<Value>) -> String {
    serde_json::to_string(&value.unwrap_or(Value::Null)).unwrap_or_default()
}

/// `count` cardinality: a field referencing evidence paper ids counts
/// supporting papers across the group; a field ending in `.evidence`
/// counts evidence items; anything else counts matches.
fn compute_count(matches: &[TripleMatch<'_>], members: &[usize], field: &str) -> Value {
    if field.contains("evidence.paper_id")
        || (field.contains("evidence") && field.contains("paper"))
    {
        let papers: usize = members.iter().map(|&i| matches[i].edge.papers.len()).sum();
        return json!(papers);
    }
    if field.ends_with(".evidence") {
        let evidence: u64 = members.iter().map(|&i| matches[i].edge.evidence_count).sum();
        return json!(evidence);
    }
    json!(members.len())
}

fn numeric_values(
    matches: &[TripleMatch<'_>],
    members: &[usize],
    field: &str,
    source_var: &str,
    edge_var: &str,
) -> Vec<f64> {
    members
        .iter()
        .filter_map(|&i| {
            matches[i]
                .bindings(source_var, edge_var)
                .resolve(field)
                .and_then(|v| v.as_f64())
        })
        .collect()
}

fn compute_avg(
    matches: &[TripleMatch<'_>],
    members: &[usize],
    field: &str,
    source_var: &str,
    edge_var: &str,
) -> Value {
    let values = numeric_values(matches, members, field, source_var, edge_var);
    if values.is_empty() {
        return json!(0.0);
    }
    json!(round2(values.iter().sum::<f64>() / values.len() as f64))
}

fn compute_sum(
    matches: &[TripleMatch<'_>],
    members: &[usize],
    field: &str,
    source_var: &str,
    edge_var: &str,
) -> Value {
    let values = numeric_values(matches, members, field, source_var, edge_var);
    json!(round2(values.iter().sum::<f64>()))
}

fn compute_extreme(
    matches: &[TripleMatch<'_>],
    members: &[usize],
    field: &str,
    source_var: &str,
    edge_var: &str,
    want_max: bool,
) -> Value {
    let mut best: Option<Value> = None;
    for &i in members {
        let value = match matches[i].bindings(source_var, edge_var).resolve(field) {
            Some(v) if !v.is_null() => v,
            _ => continue,
        };
        best = Some(match best.take() {
            None => value,
            Some(current) => {
                let keep_new = if want_max {
                    cmp_values(&value, &current).is_gt()
                } else {
                    cmp_values(&value, &current).is_lt()
                };
                if keep_new {
                    value
                } else {
                    current
                }
            }
        });
    }
    best.unwrap_or(Value::Null)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
