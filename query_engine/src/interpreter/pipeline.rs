// query_engine/src/interpreter/pipeline.rs
//! Tail of every query: stable multi-key ordering, offset/limit, and
//! field projection. Projection is a pure column filter and runs last,
//! so it never changes which rows survive.

use std::cmp::Ordering;

use serde_json::Value;

use crate::backend::Row;
use crate::query::{OrderSpec, Query, SortDirection};

pub(crate) fn finish(mut rows: Vec<Row>, query: &Query) -> Vec<Row> {
    if !query.order_by.is_empty() {
        order_rows(&mut rows, &query.order_by);
    }
    let offset = query.offset.unwrap_or(0);
    if offset > 0 {
        rows.drain(..offset.min(rows.len()));
    }
    if let Some(limit) = query.limit {
        rows.truncate(limit);
    }
    if let Some(fields) = &query.return_fields {
        rows = project_fields(rows, fields);
    }
    rows
}

/// Stable lexicographic sort over the ordering keys; `desc` reverses
/// the comparison per key, so descending order is well defined for
/// strings as well as numbers. Rows missing a key sort as null.
pub(crate) fn order_rows(rows: &mut [Row], order_by: &[OrderSpec]) {
    rows.sort_by(|a, b| {
        for spec in order_by {
            let left = a.get(&spec.field).unwrap_or(&Value::Null);
            let right = b.get(&spec.field).unwrap_or(&Value::Null);
            let mut ordering = cmp_values(left, right);
            if spec.direction == SortDirection::Desc {
                ordering = ordering.reverse();
            }
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Total order across JSON values: null < bool < number < string <
/// array < object; within a kind, the natural order (arrays
/// element-wise). Objects only compare equal to objects.
pub(crate) fn cmp_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let ordering = cmp_values(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Keep only the requested fields, in the requested order; fields the
/// row does not carry are dropped rather than emitted as null.
pub(crate) fn project_fields(rows: Vec<Row>, fields: &[String]) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            fields
                .iter()
                .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_descending_order_works_for_strings() {
        let mut rows = vec![
            row(&[("name", json!("AMPK"))]),
            row(&[("name", json!("tamoxifen"))]),
            row(&[("name", json!("PRKAA1"))]),
        ];
        let order: Vec<OrderSpec> = serde_json::from_value(json!([["name", "desc"]])).unwrap();
        order_rows(&mut rows, &order);
        assert_eq!(rows[0]["name"], json!("tamoxifen"));
        assert_eq!(rows[2]["name"], json!("AMPK"));
    }

    #[test]
    fn test_multi_key_sort_is_stable_and_lexicographic() {
        let mut rows = vec![
            row(&[("a", json!(1)), ("b", json!("x"))]),
            row(&[("a", json!(2)), ("b", json!("y"))]),
            row(&[("a", json!(1)), ("b", json!("y"))]),
        ];
        let order: Vec<OrderSpec> =
            serde_json::from_value(json!([["a"], ["b", "desc"]])).unwrap();
        order_rows(&mut rows, &order);
        assert_eq!(rows[0]["b"], json!("y"));
        assert_eq!(rows[1]["b"], json!("x"));
        assert_eq!(rows[2]["a"], json!(2));
    }

    #[test]
    fn test_missing_keys_sort_first_ascending() {
        let mut rows = vec![
            row(&[("score", json!(5))]),
            row(&[("other", json!(1))]),
        ];
        let order: Vec<OrderSpec> = serde_json::from_value(json!([["score"]])).unwrap();
        order_rows(&mut rows, &order);
        assert!(rows[0].contains_key("other"));
    }

    #[test]
    fn test_offset_and_limit_truncate_after_ordering() {
        let rows: Vec<Row> = (0..5).map(|i| row(&[("n", json!(i))])).collect();
        let query = crate::query::Query::from_value(json!({
            "find": "nodes",
            "order_by": [["n", "desc"]],
            "offset": 1,
            "limit": 2
        }))
        .unwrap();
        let out = finish(rows, &query);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["n"], json!(3));
        assert_eq!(out[1]["n"], json!(2));
    }

    #[test]
    fn test_oversized_offset_yields_empty() {
        let rows: Vec<Row> = (0..2).map(|i| row(&[("n", json!(i))])).collect();
        let query = crate::query::Query::from_value(json!({"find": "nodes", "offset": 10}))
            .unwrap();
        assert!(finish(rows, &query).is_empty());
    }

    #[test]
    fn test_projection_keeps_only_known_fields() {
        let rows = vec![row(&[("keep", json!(1)), ("drop", json!(2))])];
        let out = project_fields(rows, &["keep".to_string(), "missing".to_string()]);
        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0]["keep"], json!(1));
    }
}
