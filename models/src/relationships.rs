// models/src/relationships.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed, confidence-scored, evidence-backed edge between two entities.
///
/// `subject_id`/`object_id` reference entity ids; the referential invariant
/// is enforced by the backing store, not here. `predicate` comparison is
/// case-insensitive throughout the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub subject_id: String,
    pub predicate: String,
    pub object_id: String,

    #[serde(default)]
    pub confidence: f64,

    #[serde(default)]
    pub evidence_count: u64,

    /// Ids of the papers supporting this relationship.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub papers: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Relationship {
    pub fn new(
        subject_id: impl Into<String>,
        predicate: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Self {
        Relationship {
            subject_id: subject_id.into(),
            predicate: predicate.into(),
            object_id: object_id.into(),
            confidence: 0.0,
            evidence_count: 0,
            papers: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Case-insensitive predicate comparison.
    pub fn predicate_matches(&self, other: &str) -> bool {
        self.predicate.eq_ignore_ascii_case(other)
    }

    /// Look up an attribute by name, falling through to one-level
    /// `metadata` keys. `relation_type` aliases `predicate`.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "subject_id" => Some(Value::String(self.subject_id.clone())),
            "predicate" | "relation_type" => Some(Value::String(self.predicate.clone())),
            "object_id" => Some(Value::String(self.object_id.clone())),
            "confidence" => serde_json::Number::from_f64(self.confidence).map(Value::Number),
            "evidence_count" => Some(Value::Number(self.evidence_count.into())),
            "papers" => Some(Value::Array(
                self.papers.iter().cloned().map(Value::String).collect(),
            )),
            other => self.metadata.get(other).cloned(),
        }
    }
}
