//! Key Indexer - Groups a dataset's rows by normalized join-key value
//!
//! One index is built per dataset per join attempt and discarded afterwards.
//! The executor and the stats calculator both walk keys through
//! [`all_keys`], so their key visiting order is identical by construction.

use crate::dataset::Dataset;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Canonical string form of a cell value used for key equality.
///
/// Returns `None` for unjoinable values: null, missing, or anything whose
/// trimmed string form is empty. Rows with an unjoinable key never enter
/// any group. This is a string-equality join, not a typed comparison.
pub fn normalize_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        other => Some(other.to_string()),
    }
}

/// Per-dataset mapping from normalized key to the rows sharing it.
///
/// Row indices within a group preserve the dataset's original row order;
/// `order` records each key in first-encounter order.
#[derive(Debug, Default)]
pub struct KeyIndex {
    pub order: Vec<String>,
    pub groups: HashMap<String, Vec<usize>>,
}

impl KeyIndex {
    /// Build the index over `dataset` using `key_column`.
    ///
    /// A `None` column (the dataset is absent from the candidate's mapping)
    /// yields an empty index: the dataset is invisible to every key during
    /// this join. That is a configuration gap, not an error.
    pub fn build(dataset: &Dataset, key_column: Option<&str>) -> Self {
        let mut index = KeyIndex::default();
        let Some(column) = key_column else {
            return index;
        };

        for (row_idx, row) in dataset.rows.iter().enumerate() {
            let Some(key) = normalize_key(row.get(column)) else {
                continue;
            };
            match index.groups.get_mut(&key) {
                Some(group) => group.push(row_idx),
                None => {
                    index.order.push(key.clone());
                    index.groups.insert(key, vec![row_idx]);
                }
            }
        }

        index
    }

    /// Number of rows grouped under `key` (0 if absent).
    pub fn count(&self, key: &str) -> usize {
        self.groups.get(key).map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Union of keys across all indexes, in first-encountered order scanning
/// the indexes in their given order.
pub fn all_keys(indexes: &[KeyIndex]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for index in indexes {
        for key in &index.order {
            if seen.insert(key.clone()) {
                keys.push(key.clone());
            }
        }
    }
    keys
}
