//! Merge Service - Orchestrates the join engine and the reasoning boundary
//!
//! The engine itself never talks to the reasoning service; this layer owns
//! that boundary and its failure policy: discovery and semantic merges
//! surface typed errors, plan and chat degrade to a readable fallback
//! message, and malformed semantic responses become an empty result.

use crate::dataset::{Dataset, JoinCandidate, JoinType};
use crate::error::Result;
use crate::join_executor::{self, JoinOptions, JoinOutcome};
use crate::join_stats::JoinStats;
use crate::llm::ReasoningService;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub struct MergeService {
    reasoner: Arc<dyn ReasoningService>,
}

impl MergeService {
    pub fn new(reasoner: Arc<dyn ReasoningService>) -> Self {
        Self { reasoner }
    }

    /// Ask the reasoning service for ranked join candidates. Failures are
    /// typed; an empty list means the service found nothing usable.
    pub async fn discover_candidates(&self, datasets: &[Dataset]) -> Result<Vec<JoinCandidate>> {
        let summaries: Vec<_> = datasets.iter().map(|d| d.summary(3)).collect();
        let candidates = self.reasoner.propose_candidates(&summaries).await?;
        info!("Reasoning service proposed {} candidates", candidates.len());
        Ok(candidates)
    }

    /// Estimate result sizes for all four key-equality join types without
    /// materializing anything.
    pub fn preview_stats(&self, datasets: &[Dataset], candidate: &JoinCandidate) -> JoinStats {
        let indexes = join_executor::build_indexes(datasets, candidate);
        JoinStats::estimate(&indexes)
    }

    /// Execute a key-equality join. Cannot fail: configuration gaps degrade
    /// to missing participation.
    pub fn run_join(
        &self,
        datasets: &[Dataset],
        candidate: &JoinCandidate,
        join_type: JoinType,
        options: JoinOptions,
    ) -> JoinOutcome {
        let outcome = join_executor::execute_with_options(datasets, candidate, join_type, options);
        if outcome.truncated_keys > 0 {
            warn!(
                "{} join truncated {} keys at the per-key cap",
                join_type, outcome.truncated_keys
            );
        }
        info!(
            "{} join produced {} records",
            join_type,
            outcome.records.len()
        );
        outcome
    }

    /// Delegate the merge to the reasoning service. The rows come back
    /// already sanitized; an empty result means the service produced
    /// nothing usable, which callers present as such rather than an error.
    pub async fn semantic_merge(
        &self,
        datasets: &[Dataset],
        candidate: &JoinCandidate,
    ) -> Result<Vec<Map<String, Value>>> {
        let instructions = format!(
            "Match records that refer to the same entity, using '{}' as the guiding key. {}",
            candidate.key_name, candidate.reasoning
        );
        let rows = self
            .reasoner
            .execute_semantic_merge(datasets, &instructions)
            .await?;
        if rows.is_empty() {
            warn!("Semantic merge produced no usable rows");
        } else {
            info!("Semantic merge produced {} records", rows.len());
        }
        Ok(rows)
    }

    /// Human-readable description of the pending merge. Never fails: a
    /// reasoning failure degrades to a fallback message.
    pub async fn merge_plan(&self, datasets: &[Dataset], candidate: &JoinCandidate) -> String {
        let summaries: Vec<_> = datasets.iter().map(|d| d.summary(3)).collect();
        match self.reasoner.draft_merge_plan(&summaries, candidate).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Merge plan generation failed: {}", e);
                "Could not generate a merge plan right now. The merge itself is unaffected."
                    .to_string()
            }
        }
    }

    /// Conversational answer about the workspace, with the same degraded
    /// fallback policy as `merge_plan`.
    pub async fn chat(&self, question: &str, context: &str) -> String {
        match self.reasoner.chat(question, context).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Chat failed: {}", e);
                "Could not generate an answer right now. Please try again.".to_string()
            }
        }
    }
}
