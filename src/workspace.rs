//! Workspace - The set of uploaded datasets plus the latest merge result
//!
//! Request-scoped engine state never lives here; the workspace only holds
//! what the user uploaded and what they last produced, and round-trips
//! through JSON for save/restore.

use crate::dataset::{Dataset, DatasetSummary};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// A stored merge output with enough metadata to re-render or re-export it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedResult {
    /// Join semantics used ("inner", "left", "outer", "additive", "semantic")
    pub join_type: String,

    /// Output key column name
    pub key_name: String,

    /// Flat merged records
    pub records: Vec<Map<String, Value>>,

    /// Keys cut short when a per-key cap was in force
    pub truncated_keys: u64,

    pub created_at: DateTime<Utc>,
}

impl MergedResult {
    pub fn new(
        join_type: impl Into<String>,
        key_name: impl Into<String>,
        records: Vec<Map<String, Value>>,
        truncated_keys: u64,
    ) -> Self {
        Self {
            join_type: join_type.into(),
            key_name: key_name.into(),
            records,
            truncated_keys,
            created_at: Utc::now(),
        }
    }
}

/// All uploaded datasets for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    pub datasets: Vec<Dataset>,

    /// Most recent merge output, if any
    pub merged: Option<MergedResult>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset. Names are unique within a workspace; uploading a file
    /// with an existing name replaces the previous dataset.
    pub fn add_dataset(&mut self, dataset: Dataset) {
        if let Some(existing) = self.datasets.iter_mut().find(|d| d.name == dataset.name) {
            info!("Replacing dataset {}", dataset.name);
            *existing = dataset;
        } else {
            self.datasets.push(dataset);
        }
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    pub fn remove_dataset(&mut self, name: &str) -> bool {
        let before = self.datasets.len();
        self.datasets.retain(|d| d.name != name);
        self.datasets.len() != before
    }

    /// Summaries for reasoning-service prompts and candidate discovery.
    pub fn summaries(&self, sample_size: usize) -> Vec<DatasetSummary> {
        self.datasets
            .iter()
            .map(|d| d.summary(sample_size))
            .collect()
    }

    /// Load a workspace from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let workspace: Workspace = serde_json::from_str(&content)?;
        Ok(workspace)
    }

    /// Save the workspace to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(&self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
