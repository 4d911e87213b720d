// models/src/entities.rs
use std::fmt;
use std::str::FromStr;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity categories in the knowledge graph.
///
/// The vocabulary is fixed, but extraction occasionally produces types
/// outside it; those round-trip through `Other` instead of failing
/// deserialization.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum EntityType {
    Disease,
    Symptom,
    Drug,
    Gene,
    Mutation,
    Protein,
    Pathway,
    AnatomicalStructure,
    Procedure,
    Test,
    Biomarker,
    Hypothesis,
    StudyDesign,
    StatisticalMethod,
    EvidenceLine,
    Paper,
    Author,
    Institution,
    ClinicalTrial,
    Other(String),
}

impl EntityType {
    pub fn as_str(&self) -> &str {
        match self {
            EntityType::Disease => "disease",
            EntityType::Symptom => "symptom",
            EntityType::Drug => "drug",
            EntityType::Gene => "gene",
            EntityType::Mutation => "mutation",
            EntityType::Protein => "protein",
            EntityType::Pathway => "pathway",
            EntityType::AnatomicalStructure => "anatomical_structure",
            EntityType::Procedure => "procedure",
            EntityType::Test => "test",
            EntityType::Biomarker => "biomarker",
            EntityType::Hypothesis => "hypothesis",
            EntityType::StudyDesign => "study_design",
            EntityType::StatisticalMethod => "statistical_method",
            EntityType::EvidenceLine => "evidence_line",
            EntityType::Paper => "paper",
            EntityType::Author => "author",
            EntityType::Institution => "institution",
            EntityType::ClinicalTrial => "clinical_trial",
            EntityType::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "disease" => EntityType::Disease,
            "symptom" => EntityType::Symptom,
            "drug" => EntityType::Drug,
            "gene" => EntityType::Gene,
            "mutation" => EntityType::Mutation,
            "protein" => EntityType::Protein,
            "pathway" => EntityType::Pathway,
            "anatomical_structure" => EntityType::AnatomicalStructure,
            "procedure" => EntityType::Procedure,
            "test" => EntityType::Test,
            "biomarker" => EntityType::Biomarker,
            "hypothesis" => EntityType::Hypothesis,
            "study_design" => EntityType::StudyDesign,
            "statistical_method" => EntityType::StatisticalMethod,
            "evidence_line" => EntityType::EvidenceLine,
            "paper" => EntityType::Paper,
            "author" => EntityType::Author,
            "institution" => EntityType::Institution,
            "clinical_trial" => EntityType::ClinicalTrial,
            other => EntityType::Other(other.to_string()),
        })
    }
}

impl Serialize for EntityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.parse() {
            Ok(entity_type) => entity_type,
            Err(infallible) => match infallible {},
        })
    }
}

/// An immutable node in the knowledge graph, keyed by unique `id`
/// (an ontology identifier such as `UMLS:C0006142` or `RxNorm:1187832`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,

    #[serde(rename = "type")]
    pub entity_type: EntityType,

    pub name: String,

    /// Canonical ontology identifier, when normalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,

    /// Mention count across the ingested corpus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mentions: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, entity_type: EntityType, name: impl Into<String>) -> Self {
        Entity {
            id: id.into(),
            entity_type,
            name: name.into(),
            canonical_id: None,
            mentions: None,
            aliases: Vec::new(),
            description: None,
        }
    }

    /// Look up an attribute by name. `node_type` aliases `type`.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.clone())),
            "type" | "node_type" => Some(Value::String(self.entity_type.to_string())),
            "name" => Some(Value::String(self.name.clone())),
            "canonical_id" => self.canonical_id.clone().map(Value::String),
            "mentions" => self.mentions.map(|m| Value::Number(m.into())),
            "aliases" => Some(Value::Array(
                self.aliases.iter().cloned().map(Value::String).collect(),
            )),
            "description" => self.description.clone().map(Value::String),
            _ => None,
        }
    }
}
