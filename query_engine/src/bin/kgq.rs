// query_engine/src/bin/kgq.rs
//! Run one query against a knowledge-graph snapshot file.
//!
//! Usage: `kgq snapshot.json < query.json`
//!
//! The snapshot is a JSON object with `entities` and `relationships`
//! arrays; the query envelope is read from stdin and the response
//! envelope printed to stdout.

use std::fs::File;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use models::{Entity, KnowledgeGraph, Relationship};
use query_engine::{Dispatcher, GraphInterpreter};
use serde::Deserialize;

#[derive(Deserialize)]
struct Snapshot {
    entities: Vec<Entity>,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .context("usage: kgq <snapshot.json> < query.json")?;
    let file = File::open(&path).with_context(|| format!("opening snapshot {path}"))?;
    let snapshot: Snapshot =
        serde_json::from_reader(file).with_context(|| format!("parsing snapshot {path}"))?;
    let graph = Arc::new(KnowledgeGraph::new(snapshot.entities, snapshot.relationships));
    info!(
        "loaded snapshot: {} entities, {} relationships",
        graph.entity_count(),
        graph.relationship_count()
    );

    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .context("reading query from stdin")?;
    let envelope: serde_json::Value =
        serde_json::from_str(&raw).context("parsing query envelope")?;

    let dispatcher = Dispatcher::new(Arc::new(GraphInterpreter::new(graph)));
    let response = dispatcher.dispatch(envelope).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
