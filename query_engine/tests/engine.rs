// query_engine/tests/engine.rs
//! End-to-end runs through the dispatcher against an in-memory
//! snapshot, covering the headline query shapes: evidence counting
//! with ordering, a two-hop mechanism path, and the regex length cap.

use std::sync::Arc;

use models::{Entity, EntityType, KnowledgeGraph, Relationship};
use query_engine::{Dispatcher, GraphInterpreter};
use serde_json::{json, Value};

fn dispatcher() -> Dispatcher {
    let _ = env_logger::builder().is_test(true).try_init();
    let entities = vec![
        Entity::new("drug:tamoxifen", EntityType::Drug, "Tamoxifen"),
        Entity::new("drug:trastuzumab", EntityType::Drug, "Trastuzumab"),
        Entity::new("drug:metformin", EntityType::Drug, "metformin"),
        Entity::new("disease:breast_cancer", EntityType::Disease, "Breast Cancer"),
        Entity::new("protein:ampk", EntityType::Protein, "AMPK"),
        Entity::new("gene:prkaa1", EntityType::Gene, "PRKAA1"),
    ];

    let mut tamoxifen = Relationship::new("drug:tamoxifen", "TREATS", "disease:breast_cancer");
    tamoxifen.confidence = 0.92;
    tamoxifen.papers = (0..234).map(|i| format!("PMC{i}")).collect();

    let mut trastuzumab = Relationship::new("drug:trastuzumab", "TREATS", "disease:breast_cancer");
    trastuzumab.confidence = 0.88;
    trastuzumab.papers = (0..189).map(|i| format!("PMC9{i}")).collect();

    // Below the 0.7 confidence threshold used in the aggregation test.
    let mut weak = Relationship::new("drug:metformin", "TREATS", "disease:breast_cancer");
    weak.confidence = 0.35;
    weak.papers = vec!["PMC1".to_string()];

    let mut activates = Relationship::new("drug:metformin", "ACTIVATES", "protein:ampk");
    activates.confidence = 0.82;
    let mut encoded_by = Relationship::new("protein:ampk", "ENCODED_BY", "gene:prkaa1");
    encoded_by.confidence = 0.97;

    let graph = Arc::new(KnowledgeGraph::new(
        entities,
        vec![tamoxifen, trastuzumab, weak, activates, encoded_by],
    ));
    Dispatcher::new(Arc::new(GraphInterpreter::new(graph)))
}

#[tokio::test]
async fn test_paper_counts_grouped_by_drug_descending() {
    let response = dispatcher()
        .dispatch(json!({
            "find": "nodes",
            "node_pattern": {"node_type": "drug", "var": "drug"},
            "edge_pattern": {"relation_type": "TREATS", "min_confidence": 0.7, "var": "treatment"},
            "aggregate": {
                "group_by": ["drug.name"],
                "aggregations": {"paper_count": ["count", "treatment.evidence.paper_id"]}
            },
            "order_by": [["paper_count", "desc"]]
        }))
        .await;
    let results = response["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["drug.name"], json!("Tamoxifen"));
    assert_eq!(results[0]["paper_count"], json!(234));
    assert_eq!(results[1]["drug.name"], json!("Trastuzumab"));
    assert_eq!(results[1]["paper_count"], json!(189));
}

#[tokio::test]
async fn test_two_hop_mechanism_path() {
    let response = dispatcher()
        .dispatch(json!({
            "find": "paths",
            "path_pattern": {
                "start": {"node_type": "drug", "name": "metformin", "var": "drug"},
                "edges": [
                    [{"relation_type": "ACTIVATES", "var": "act"}, {"node_type": "protein", "var": "protein"}],
                    [{"relation_type": "ENCODED_BY", "var": "enc"}, {"node_type": "gene", "var": "gene"}]
                ],
                "max_hops": 2
            }
        }))
        .await;
    let results = response["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["drug.name"], json!("metformin"));
    assert_eq!(results[0]["protein.name"], json!("AMPK"));
    assert_eq!(results[0]["gene.name"], json!("PRKAA1"));
}

#[tokio::test]
async fn test_overlength_regex_matches_nothing() {
    let pattern = format!("^({})$", "a|".repeat(150));
    assert!(pattern.len() > 200);
    let response = dispatcher()
        .dispatch(json!({
            "find": "nodes",
            "node_pattern": {"node_type": "drug", "var": "drug"},
            "filters": [{"field": "drug.name", "operator": "regex", "value": pattern}]
        }))
        .await;
    assert_eq!(response["results"], json!([]));
    assert!(response.get("error").is_none());
}

#[tokio::test]
async fn test_malformed_hop_reports_error_envelope() {
    let response = dispatcher()
        .dispatch(json!({
            "find": "paths",
            "path_pattern": {
                "start": {"name": "metformin"},
                "edges": [[{"relation_type": "ACTIVATES"}]]
            }
        }))
        .await;
    assert_eq!(response["results"], json!([]));
    let message = response["error"].as_str().unwrap();
    assert!(!message.is_empty());
}

#[tokio::test]
async fn test_return_fields_project_columns_only() {
    let response = dispatcher()
        .dispatch(json!({
            "find": "edges",
            "edge_pattern": {"relation_type": "TREATS", "min_confidence": 0.7},
            "order_by": [["confidence", "desc"]],
            "return_fields": ["subject.name", "confidence"]
        }))
        .await;
    let results = response["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    let row = results[0].as_object().unwrap();
    assert_eq!(row.len(), 2);
    assert_eq!(row["subject.name"], json!("Tamoxifen"));
    assert_eq!(row["confidence"], json!(0.92));
}

#[tokio::test]
async fn test_responses_are_deterministic_across_runs() {
    let query = json!({
        "find": "edges",
        "order_by": [["confidence", "desc"], ["subject.name"]]
    });
    let d = dispatcher();
    let first: Value = d.dispatch(query.clone()).await;
    let second: Value = d.dispatch(query).await;
    assert_eq!(first, second);
}
