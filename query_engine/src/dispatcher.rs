// query_engine/src/dispatcher.rs
//! Request entry point: parse the JSON envelope, execute on the active
//! backend, normalize into the response envelope. Failures never
//! propagate as errors past this layer; they become
//! `{"results": [], "error": "..."}` so callers always get the same
//! shape back.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::backend::QueryBackend;
use crate::query::Query;

pub struct Dispatcher {
    backend: Arc<dyn QueryBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Dispatcher { backend }
    }

    /// Execute one raw query envelope and produce the response envelope.
    pub async fn dispatch(&self, envelope: Value) -> Value {
        let query = match Query::from_value(envelope) {
            Ok(query) => query,
            Err(err) => {
                warn!("rejected malformed query: {err}");
                return error_envelope(&err.to_string());
            }
        };
        match self.backend.execute(&query).await {
            Ok(rows) => {
                debug!(
                    "backend {} returned {} rows",
                    self.backend.name(),
                    rows.len()
                );
                json!({ "results": rows })
            }
            Err(err) => {
                warn!("backend {} failed: {err}", self.backend.name());
                error_envelope(&err.to_string())
            }
        }
    }
}

fn error_envelope(message: &str) -> Value {
    json!({ "results": [], "error": message })
}
