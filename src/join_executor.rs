//! Join Executor - Materializes the join chosen from a candidate key mapping
//!
//! Walks the same key order as the stats calculator and expands the full
//! cartesian product of matching row groups per key, so the executed row
//! count always equals the estimate for the same join type. Output order is
//! deterministic: keys in first-encounter order, dataset 0's rows varying
//! slowest within a key.

use crate::dataset::{Dataset, JoinCandidate, JoinType};
use crate::key_index::{all_keys, KeyIndex};
use crate::sanitize::{sanitize_dataset_name, sanitize_value};
use itertools::Itertools;
use serde_json::{Map, Value};

/// Match-status column emitted for additive joins.
pub const JOIN_STATUS_COLUMN: &str = "_Join_Status";

/// Execution knobs. The default reproduces the unbounded cartesian
/// semantics exactly; the per-key cap is an opt-in hardening layer for
/// callers that would rather truncate a blown-up key than materialize it.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinOptions {
    /// Maximum output rows per key. `None` means unlimited.
    pub max_rows_per_key: Option<usize>,
}

/// Materialized join output.
#[derive(Debug, Default)]
pub struct JoinOutcome {
    /// Flat records in deterministic order
    pub records: Vec<Map<String, Value>>,

    /// Number of keys whose output was cut short by `max_rows_per_key`
    pub truncated_keys: u64,
}

/// Build one key index per dataset from the candidate's column mappings.
/// A dataset the candidate does not map gets an empty index and is treated
/// as missing for every key.
pub fn build_indexes(datasets: &[Dataset], candidate: &JoinCandidate) -> Vec<KeyIndex> {
    datasets
        .iter()
        .map(|ds| KeyIndex::build(ds, candidate.mapping_for(&ds.name)))
        .collect()
}

/// Execute the join with default options (no per-key cap).
pub fn execute(datasets: &[Dataset], candidate: &JoinCandidate, join_type: JoinType) -> JoinOutcome {
    execute_with_options(datasets, candidate, join_type, JoinOptions::default())
}

/// Execute the join, producing the ordered flat record set.
pub fn execute_with_options(
    datasets: &[Dataset],
    candidate: &JoinCandidate,
    join_type: JoinType,
    options: JoinOptions,
) -> JoinOutcome {
    let indexes = build_indexes(datasets, candidate);
    let clean_names: Vec<String> = datasets
        .iter()
        .map(|ds| sanitize_dataset_name(&ds.name))
        .collect();

    let mut outcome = JoinOutcome::default();

    for key in all_keys(&indexes) {
        // INNER and LEFT can rule a key out before expanding anything.
        match join_type {
            JoinType::Inner if indexes.iter().any(|ix| ix.count(&key) == 0) => continue,
            JoinType::Left if indexes.first().map(|ix| ix.count(&key)).unwrap_or(0) == 0 => {
                continue
            }
            _ => {}
        }

        // One slot vector per dataset: matching row indices, or a single
        // placeholder when the dataset has no rows for this key.
        let slots: Vec<Vec<Option<usize>>> = indexes
            .iter()
            .map(|ix| match ix.groups.get(&key) {
                Some(group) => group.iter().map(|&row| Some(row)).collect(),
                None => vec![None],
            })
            .collect();

        let key_start = outcome.records.len();
        let mut truncated = false;

        let combinations = slots
            .iter()
            .map(|slot| slot.iter().copied())
            .multi_cartesian_product()
            .filter(|combo| match join_type {
                JoinType::Inner => combo.iter().all(|slot| slot.is_some()),
                JoinType::Left => combo.first().map(|slot| slot.is_some()).unwrap_or(false),
                JoinType::Outer | JoinType::Additive => true,
            });

        for combo in combinations {
            if let Some(cap) = options.max_rows_per_key {
                if outcome.records.len() - key_start >= cap {
                    truncated = true;
                    break;
                }
            }
            let record = build_record(
                &key,
                &combo,
                datasets,
                &clean_names,
                candidate,
                join_type,
            );
            outcome.records.push(record);
        }

        if truncated {
            outcome.truncated_keys += 1;
            if join_type == JoinType::Additive {
                for record in &mut outcome.records[key_start..] {
                    record.insert(
                        JOIN_STATUS_COLUMN.to_string(),
                        Value::String("Truncated".to_string()),
                    );
                }
            }
        }
    }

    outcome
}

/// Assemble one output record from a combination of per-dataset rows.
fn build_record(
    key: &str,
    combo: &[Option<usize>],
    datasets: &[Dataset],
    clean_names: &[String],
    candidate: &JoinCandidate,
    join_type: JoinType,
) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(candidate.key_name.clone(), Value::String(key.to_string()));

    let mut found_in: Vec<&str> = Vec::new();
    let mut missing_in: Vec<&str> = Vec::new();

    for (pos, slot) in combo.iter().enumerate() {
        let dataset = &datasets[pos];
        match slot {
            Some(row_idx) => {
                let key_column = candidate.mapping_for(&dataset.name);
                for (column, value) in &dataset.rows[*row_idx] {
                    if Some(column.as_str()) == key_column {
                        continue;
                    }
                    record.insert(
                        format!("{} - {}", clean_names[pos], column),
                        sanitize_value(value),
                    );
                }
                found_in.push(dataset.name.as_str());
            }
            None => missing_in.push(dataset.name.as_str()),
        }
    }

    if join_type == JoinType::Additive {
        let status = if missing_in.is_empty() {
            "Matched (All Files)".to_string()
        } else if found_in.len() == 1 {
            format!("Unique to {}", found_in[0])
        } else {
            format!("Partial Match (Found in {}/{})", found_in.len(), datasets.len())
        };
        record.insert(JOIN_STATUS_COLUMN.to_string(), Value::String(status));

        for (pos, _) in datasets.iter().enumerate() {
            let flag = if combo[pos].is_some() { "TRUE" } else { "FALSE" };
            record.insert(
                format!("_Found_In_{}", clean_names[pos]),
                Value::String(flag.to_string()),
            );
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join_stats::JoinStats;
    use serde_json::json;
    use std::collections::HashMap;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        let mut m = Map::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        m
    }

    fn customers() -> Dataset {
        let rows = ["101", "102", "103", "104", "105"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                row(&[
                    ("CustomerID", json!(id)),
                    ("Name", json!(format!("Customer {}", i + 1))),
                ])
            })
            .collect();
        Dataset::new(
            "customers.csv",
            vec!["CustomerID".to_string(), "Name".to_string()],
            rows,
        )
    }

    fn orders() -> Dataset {
        let rows = [
            ("101", "O-1"),
            ("101", "O-2"),
            ("102", "O-3"),
            ("103", "O-4"),
            ("103", "O-5"),
            ("999", "O-6"),
        ]
        .iter()
        .map(|(id, order)| row(&[("Cust_Ref_ID", json!(id)), ("OrderNo", json!(order))]))
        .collect();
        Dataset::new(
            "orders.csv",
            vec!["Cust_Ref_ID".to_string(), "OrderNo".to_string()],
            rows,
        )
    }

    fn candidate() -> JoinCandidate {
        let mut mappings = HashMap::new();
        mappings.insert("customers.csv".to_string(), "CustomerID".to_string());
        mappings.insert("orders.csv".to_string(), "Cust_Ref_ID".to_string());
        JoinCandidate {
            key_name: "CustomerID".to_string(),
            column_mappings: mappings,
            confidence: 0.95,
            reasoning: "shared customer identifier".to_string(),
            issues: vec![],
        }
    }

    #[test]
    fn test_executor_agrees_with_estimator() {
        let datasets = vec![customers(), orders()];
        let cand = candidate();
        let stats = JoinStats::estimate(&build_indexes(&datasets, &cand));

        for join_type in [
            JoinType::Inner,
            JoinType::Left,
            JoinType::Outer,
            JoinType::Additive,
        ] {
            let outcome = execute(&datasets, &cand, join_type);
            assert_eq!(
                outcome.records.len() as u64,
                stats.for_type(join_type),
                "estimate mismatch for {}",
                join_type
            );
        }
    }

    #[test]
    fn test_inner_counts_and_key_column() {
        let datasets = vec![customers(), orders()];
        let outcome = execute(&datasets, &candidate(), JoinType::Inner);
        assert_eq!(outcome.records.len(), 5);
        for record in &outcome.records {
            assert!(record.contains_key("CustomerID"));
            assert!(record.contains_key("customers - Name"));
            assert!(record.contains_key("orders - OrderNo"));
            // The mapped key column never appears under a dataset prefix.
            assert!(!record.contains_key("orders - Cust_Ref_ID"));
        }
    }

    #[test]
    fn test_deterministic_order_left_varies_slowest() {
        let datasets = vec![customers(), orders()];
        let outcome = execute(&datasets, &candidate(), JoinType::Inner);
        let keys: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r["CustomerID"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["101", "101", "102", "103", "103"]);
        let orders_seen: Vec<&str> = outcome
            .records
            .iter()
            .map(|r| r["orders - OrderNo"].as_str().unwrap())
            .collect();
        assert_eq!(orders_seen, vec!["O-1", "O-2", "O-3", "O-4", "O-5"]);
    }

    #[test]
    fn test_repeated_execution_is_identical() {
        let datasets = vec![customers(), orders()];
        let first = execute(&datasets, &candidate(), JoinType::Additive);
        let second = execute(&datasets, &candidate(), JoinType::Additive);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn test_additive_statuses() {
        let datasets = vec![customers(), orders()];
        let outcome = execute(&datasets, &candidate(), JoinType::Additive);
        assert_eq!(outcome.records.len(), 8);

        let by_key = |k: &str| {
            outcome
                .records
                .iter()
                .find(|r| r["CustomerID"] == json!(k))
                .unwrap()
        };

        assert_eq!(
            by_key("101")[JOIN_STATUS_COLUMN],
            json!("Matched (All Files)")
        );
        assert_eq!(
            by_key("104")[JOIN_STATUS_COLUMN],
            json!("Unique to customers.csv")
        );
        assert_eq!(
            by_key("999")[JOIN_STATUS_COLUMN],
            json!("Unique to orders.csv")
        );

        assert_eq!(by_key("104")["_Found_In_customers"], json!("TRUE"));
        assert_eq!(by_key("104")["_Found_In_orders"], json!("FALSE"));
        assert_eq!(by_key("101")["_Found_In_orders"], json!("TRUE"));
    }

    #[test]
    fn test_partial_match_status_with_three_files() {
        let a = Dataset::new(
            "a.csv",
            vec!["id".to_string()],
            vec![row(&[("id", json!("k"))])],
        );
        let b = Dataset::new(
            "b.csv",
            vec!["id".to_string()],
            vec![row(&[("id", json!("k"))])],
        );
        let c = Dataset::new(
            "c.csv",
            vec!["id".to_string()],
            vec![row(&[("id", json!("other"))])],
        );
        let mut mappings = HashMap::new();
        for name in ["a.csv", "b.csv", "c.csv"] {
            mappings.insert(name.to_string(), "id".to_string());
        }
        let cand = JoinCandidate {
            key_name: "id".to_string(),
            column_mappings: mappings,
            confidence: 1.0,
            reasoning: String::new(),
            issues: vec![],
        };

        let outcome = execute(&[a, b, c], &cand, JoinType::Additive);
        let k_record = outcome
            .records
            .iter()
            .find(|r| r["id"] == json!("k"))
            .unwrap();
        assert_eq!(
            k_record[JOIN_STATUS_COLUMN],
            json!("Partial Match (Found in 2/3)")
        );
    }

    #[test]
    fn test_shared_column_names_stay_isolated() {
        let a = Dataset::new(
            "east.csv",
            vec!["id".to_string(), "Name".to_string()],
            vec![row(&[("id", json!("1")), ("Name", json!("East Co"))])],
        );
        let b = Dataset::new(
            "west.csv",
            vec!["id".to_string(), "Name".to_string()],
            vec![row(&[("id", json!("1")), ("Name", json!("West Co"))])],
        );
        let mut mappings = HashMap::new();
        mappings.insert("east.csv".to_string(), "id".to_string());
        mappings.insert("west.csv".to_string(), "id".to_string());
        let cand = JoinCandidate {
            key_name: "id".to_string(),
            column_mappings: mappings,
            confidence: 1.0,
            reasoning: String::new(),
            issues: vec![],
        };

        let outcome = execute(&[a, b], &cand, JoinType::Inner);
        let record = &outcome.records[0];
        assert_eq!(record["east - Name"], json!("East Co"));
        assert_eq!(record["west - Name"], json!("West Co"));
    }

    #[test]
    fn test_per_key_cap_truncates_and_flags() {
        let a = Dataset::new(
            "a.csv",
            vec!["k".to_string(), "n".to_string()],
            (0..3).map(|i| row(&[("k", json!("dup")), ("n", json!(i))])).collect(),
        );
        let b = Dataset::new(
            "b.csv",
            vec!["k".to_string(), "m".to_string()],
            (0..3).map(|i| row(&[("k", json!("dup")), ("m", json!(i))])).collect(),
        );
        let mut mappings = HashMap::new();
        mappings.insert("a.csv".to_string(), "k".to_string());
        mappings.insert("b.csv".to_string(), "k".to_string());
        let cand = JoinCandidate {
            key_name: "k".to_string(),
            column_mappings: mappings,
            confidence: 1.0,
            reasoning: String::new(),
            issues: vec![],
        };

        let options = JoinOptions {
            max_rows_per_key: Some(4),
        };
        let outcome = execute_with_options(&[a.clone(), b.clone()], &cand, JoinType::Additive, options);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(outcome.truncated_keys, 1);
        for record in &outcome.records {
            assert_eq!(record[JOIN_STATUS_COLUMN], json!("Truncated"));
        }

        // Default options reproduce the full blow-up.
        let full = execute(&[a, b], &cand, JoinType::Additive);
        assert_eq!(full.records.len(), 9);
        assert_eq!(full.truncated_keys, 0);
    }

    #[test]
    fn test_unmapped_dataset_disappears_from_inner_output() {
        let datasets = vec![customers(), orders()];
        let mut mappings = HashMap::new();
        mappings.insert("customers.csv".to_string(), "CustomerID".to_string());
        let cand = JoinCandidate {
            key_name: "CustomerID".to_string(),
            column_mappings: mappings,
            confidence: 0.5,
            reasoning: String::new(),
            issues: vec![],
        };

        // Orders has no mapping, so INNER drops every key.
        let inner = execute(&datasets, &cand, JoinType::Inner);
        assert!(inner.records.is_empty());

        // LEFT keeps customers with orders always missing.
        let left = execute(&datasets, &cand, JoinType::Left);
        assert_eq!(left.records.len(), 5);
        assert!(left.records[0].contains_key("customers - Name"));
        assert!(!left.records.iter().any(|r| r.contains_key("orders - OrderNo")));
    }
}
