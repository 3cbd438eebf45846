//! Join Stats Calculator - Estimates result cardinality without running the join
//!
//! Works purely from per-dataset key occurrence counts. The arithmetic is
//! deliberately non-standard: duplicate keys multiply on every side, and a
//! dataset with no match for a key contributes a single virtual placeholder
//! under OUTER/ADDITIVE/LEFT semantics. The executor reproduces exactly the
//! same combinations, so estimate and execution always agree.

use crate::dataset::JoinType;
use crate::key_index::{all_keys, KeyIndex};
use serde::{Deserialize, Serialize};

/// Estimated row counts per join type. The AI semantic merge has no
/// estimate; its size is unknown until the reasoning service runs it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    pub inner: u64,
    pub left: u64,
    pub outer: u64,
    pub additive: u64,
}

impl JoinStats {
    /// Estimate all four counts from the per-dataset key indexes.
    pub fn estimate(indexes: &[KeyIndex]) -> JoinStats {
        let mut stats = JoinStats::default();

        for key in all_keys(indexes) {
            let counts: Vec<u64> = indexes.iter().map(|ix| ix.count(&key) as u64).collect();

            let exact = counts
                .iter()
                .fold(1u64, |acc, &c| acc.saturating_mul(c));
            let padded = counts
                .iter()
                .fold(1u64, |acc, &c| acc.saturating_mul(c.max(1)));

            stats.inner = stats.inner.saturating_add(exact);
            stats.outer = stats.outer.saturating_add(padded);
            stats.additive = stats.additive.saturating_add(padded);

            // LEFT keeps a key only when the first (left) dataset has it.
            let left_count = counts.first().copied().unwrap_or(0);
            if left_count > 0 {
                let rest = counts[1..]
                    .iter()
                    .fold(1u64, |acc, &c| acc.saturating_mul(c.max(1)));
                stats.left = stats.left.saturating_add(left_count.saturating_mul(rest));
            }
        }

        stats
    }

    /// Estimate for one join type.
    pub fn for_type(&self, join_type: JoinType) -> u64 {
        match join_type {
            JoinType::Inner => self.inner,
            JoinType::Left => self.left,
            JoinType::Outer => self.outer,
            JoinType::Additive => self.additive,
        }
    }
}
