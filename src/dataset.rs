//! Core data shapes shared by the join engine and its collaborators

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// An uploaded tabular dataset: an ordered column list plus ordered rows.
///
/// Invariant: every row's keys are a subset of `columns`. Row values are
/// scalar JSON values; the ingestion boundary sanitizes anything nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Stable identifier assigned at upload time
    pub id: Uuid,

    /// File name as uploaded; unique within a workspace
    pub name: String,

    /// Column names in original order
    pub columns: Vec<String>,

    /// Rows in original order, as column -> value records
    pub rows: Vec<Map<String, Value>>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            columns,
            rows,
        }
    }

    /// Compact summary used to build reasoning-service prompts.
    pub fn summary(&self, sample_size: usize) -> DatasetSummary {
        DatasetSummary {
            name: self.name.clone(),
            columns: self.columns.clone(),
            row_count: self.rows.len(),
            sample_rows: self.rows.iter().take(sample_size).cloned().collect(),
        }
    }
}

/// What the reasoning service sees about a dataset: shape plus a few rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub sample_rows: Vec<Map<String, Value>>,
}

/// A proposed join key: one column per participating dataset.
///
/// Produced by candidate discovery (heuristic or reasoning service) and
/// immutable once handed to the engine. A dataset absent from
/// `column_mappings` contributes no rows to the join for this candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCandidate {
    /// Display name of the key; becomes the key column in the output
    pub key_name: String,

    /// Dataset name -> column name holding the key in that dataset
    pub column_mappings: HashMap<String, String>,

    /// Confidence level (0.0 - 1.0)
    pub confidence: f64,

    /// Why this candidate was proposed
    pub reasoning: String,

    /// Known caveats, e.g. low value overlap between files
    #[serde(default)]
    pub issues: Vec<String>,
}

impl JoinCandidate {
    /// Mapped key column for a dataset, if it participates in this candidate.
    pub fn mapping_for(&self, dataset_name: &str) -> Option<&str> {
        self.column_mappings.get(dataset_name).map(|s| s.as_str())
    }
}

/// The four key-equality join semantics the engine computes itself.
/// The AI semantic merge is a separate path owned by the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Outer,
    Additive,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Outer => "outer",
            JoinType::Additive => "additive",
        }
    }
}

impl std::str::FromStr for JoinType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            "outer" | "full" => Ok(JoinType::Outer),
            "additive" => Ok(JoinType::Additive),
            other => Err(format!("Unknown join type: {}", other)),
        }
    }
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
