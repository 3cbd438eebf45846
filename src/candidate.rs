//! Heuristic key-candidate discovery
//!
//! Offline fallback to the reasoning service: scores column pairs across
//! datasets by normalized header similarity plus sampled value overlap and
//! emits ranked join candidates. Callers pick this path when no reasoning
//! service is configured; the engine itself never calls it.

use crate::dataset::{Dataset, JoinCandidate};
use crate::key_index::normalize_key;
use std::collections::{HashMap, HashSet};
use strsim::jaro_winkler;
use tracing::debug;

/// Scores join-key candidates from column names and sampled values.
pub struct CandidateScout {
    /// Combined-score threshold (0.0-1.0) for accepting a column pair
    pub score_threshold: f64,
    /// How many rows to sample per dataset for value overlap
    pub sample_size: usize,
}

impl Default for CandidateScout {
    fn default() -> Self {
        Self {
            score_threshold: 0.8,
            sample_size: 200,
        }
    }
}

impl CandidateScout {
    pub fn new(score_threshold: f64) -> Self {
        Self {
            score_threshold,
            sample_size: 200,
        }
    }

    /// Propose ranked candidates across the given datasets.
    ///
    /// Each column of the first dataset is tried as a pivot; other datasets
    /// contribute their best-scoring column. A dataset with no acceptable
    /// match is left out of the mapping and flagged in `issues` - the join
    /// engine treats it as always missing.
    pub fn discover(&self, datasets: &[Dataset]) -> Vec<JoinCandidate> {
        if datasets.len() < 2 {
            return Vec::new();
        }

        let pivot = &datasets[0];
        let mut candidates = Vec::new();

        for pivot_column in &pivot.columns {
            let pivot_values = self.sample_values(pivot, pivot_column);
            if pivot_values.is_empty() {
                continue;
            }

            let mut mappings = HashMap::new();
            mappings.insert(pivot.name.clone(), pivot_column.clone());
            let mut issues = Vec::new();
            let mut scores = Vec::new();

            for other in &datasets[1..] {
                match self.best_column_match(pivot_column, &pivot_values, other) {
                    Some((column, score, overlap)) => {
                        debug!(
                            "Candidate pair {}::{} ~ {}::{} scored {:.2}",
                            pivot.name, pivot_column, other.name, column, score
                        );
                        if overlap < 0.1 {
                            issues.push(format!(
                                "Low value overlap between {} and {} on this key",
                                pivot.name, other.name
                            ));
                        }
                        mappings.insert(other.name.clone(), column);
                        scores.push(score);
                    }
                    None => {
                        issues.push(format!("No matching column found in {}", other.name));
                    }
                }
            }

            // A candidate needs at least one partner dataset.
            if mappings.len() < 2 {
                continue;
            }

            let confidence = scores.iter().sum::<f64>() / scores.len() as f64;
            candidates.push(JoinCandidate {
                key_name: pivot_column.clone(),
                column_mappings: mappings,
                confidence,
                reasoning: format!(
                    "Column headers similar to '{}' with overlapping values across {} files",
                    pivot_column,
                    scores.len() + 1
                ),
                issues,
            });
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates
    }

    /// Best column of `other` against the pivot column, as
    /// (column, combined score, value overlap). None if nothing clears the
    /// threshold.
    fn best_column_match(
        &self,
        pivot_column: &str,
        pivot_values: &HashSet<String>,
        other: &Dataset,
    ) -> Option<(String, f64, f64)> {
        let mut best: Option<(String, f64, f64)> = None;

        for column in &other.columns {
            let name_score = jaro_winkler(
                &normalize_header(pivot_column),
                &normalize_header(column),
            );
            let overlap = self.value_overlap(pivot_values, other, column);
            let score = 0.6 * name_score + 0.4 * overlap;

            if score < self.score_threshold {
                continue;
            }
            if best.as_ref().map(|(_, s, _)| score > *s).unwrap_or(true) {
                best = Some((column.clone(), score, overlap));
            }
        }

        best
    }

    /// Share of the smaller sampled value set found in both columns.
    fn value_overlap(&self, pivot_values: &HashSet<String>, other: &Dataset, column: &str) -> f64 {
        let other_values = self.sample_values(other, column);
        let smaller = pivot_values.len().min(other_values.len());
        if smaller == 0 {
            return 0.0;
        }
        let shared = pivot_values.intersection(&other_values).count();
        shared as f64 / smaller as f64
    }

    fn sample_values(&self, dataset: &Dataset, column: &str) -> HashSet<String> {
        dataset
            .rows
            .iter()
            .take(self.sample_size)
            .filter_map(|row| normalize_key(row.get(column)))
            .collect()
    }
}

/// Lowercase a header and drop separators so "Cust_Ref_ID" and
/// "custrefid" compare equal.
fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
