//! Covers the reasoning-service boundary: discovery-driven merges, the
//! sanitization gate on semantic results, degraded plan/chat fallbacks,
//! and workspace persistence of a finished merge.

use async_trait::async_trait;
use mergekit::dataset::{Dataset, DatasetSummary, JoinCandidate, JoinType};
use mergekit::error::Result;
use mergekit::export::records_to_csv;
use mergekit::ingestion::dataset_from_csv;
use mergekit::join_executor::JoinOptions;
use mergekit::llm::ReasoningService;
use mergekit::merge_service::MergeService;
use mergekit::sanitize::sanitize_external_rows;
use mergekit::workspace::{MergedResult, Workspace};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Plays back canned service responses, applying the same sanitization
/// gate the real client applies to wire payloads.
struct ScriptedReasoner {
    candidates: Vec<JoinCandidate>,
    merge_payload: Value,
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn propose_candidates(&self, _summaries: &[DatasetSummary]) -> Result<Vec<JoinCandidate>> {
        Ok(self.candidates.clone())
    }

    async fn draft_merge_plan(
        &self,
        _summaries: &[DatasetSummary],
        candidate: &JoinCandidate,
    ) -> Result<String> {
        Ok(format!("Join everything on {}.", candidate.key_name))
    }

    async fn execute_semantic_merge(
        &self,
        _datasets: &[Dataset],
        _instructions: &str,
    ) -> Result<Vec<Map<String, Value>>> {
        Ok(sanitize_external_rows(&self.merge_payload))
    }

    async fn chat(&self, _question: &str, _context: &str) -> Result<String> {
        Ok("Two files are loaded.".to_string())
    }
}

fn proposed_candidate() -> JoinCandidate {
    let mut column_mappings = HashMap::new();
    column_mappings.insert("customers.csv".to_string(), "CustomerID".to_string());
    column_mappings.insert("orders.csv".to_string(), "Cust_Ref_ID".to_string());
    JoinCandidate {
        key_name: "CustomerID".to_string(),
        column_mappings,
        confidence: 0.9,
        reasoning: "identifier columns line up".to_string(),
        issues: vec![],
    }
}

fn fixture_datasets() -> Vec<Dataset> {
    vec![
        dataset_from_csv("customers.csv", "CustomerID,Name\n101,Asha\n102,Ben\n").unwrap(),
        dataset_from_csv("orders.csv", "Cust_Ref_ID,Amount\n101,10\n101,20\n").unwrap(),
    ]
}

fn service_with(payload: Value) -> MergeService {
    MergeService::new(Arc::new(ScriptedReasoner {
        candidates: vec![proposed_candidate()],
        merge_payload: payload,
    }))
}

#[tokio::test]
async fn test_discovered_candidate_drives_key_join() {
    let service = service_with(json!([]));
    let datasets = fixture_datasets();

    let candidates = service.discover_candidates(&datasets).await.unwrap();
    assert_eq!(candidates.len(), 1);

    let stats = service.preview_stats(&datasets, &candidates[0]);
    assert_eq!(stats.inner, 2);
    assert_eq!(stats.outer, 3);

    let outcome = service.run_join(
        &datasets,
        &candidates[0],
        JoinType::Inner,
        JoinOptions::default(),
    );
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0]["customers - Name"], json!("Asha"));
    assert_eq!(outcome.records[0]["orders - Amount"], json!(10));
}

#[tokio::test]
async fn test_semantic_rows_are_sanitized() {
    let payload = json!([
        {"CustomerID": "101", "Tags": ["vip", "2024"], "Contact": {"email": "a@x.co"}},
        "stray string",
        {"CustomerID": "102", "Tags": null}
    ]);
    let service = service_with(payload);

    let rows = service
        .semantic_merge(&fixture_datasets(), &proposed_candidate())
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["Tags"], json!("vip | 2024"));
    assert_eq!(rows[0]["Contact"], json!("{\"email\":\"a@x.co\"}"));
    assert!(rows[1].is_empty());
    assert_eq!(rows[2]["Tags"], json!(null));

    // The sanitized rows export cleanly; nulls become empty cells.
    let csv = records_to_csv(&rows).unwrap();
    assert!(csv.starts_with("CustomerID,Tags,Contact\n"));
    assert!(csv.contains("vip | 2024"));
}

#[tokio::test]
async fn test_malformed_semantic_response_yields_nothing() {
    for payload in [json!("not an array"), json!({"rows": []}), json!(null)] {
        let service = service_with(payload);
        let rows = service
            .semantic_merge(&fixture_datasets(), &proposed_candidate())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}

#[tokio::test]
async fn test_plan_and_chat_pass_through() {
    let service = service_with(json!([]));
    let plan = service
        .merge_plan(&fixture_datasets(), &proposed_candidate())
        .await;
    assert_eq!(plan, "Join everything on CustomerID.");

    let answer = service.chat("what is loaded?", "{}").await;
    assert_eq!(answer, "Two files are loaded.");
}

#[tokio::test]
async fn test_workspace_persists_a_finished_merge() {
    let service = service_with(json!([]));
    let datasets = fixture_datasets();
    let outcome = service.run_join(
        &datasets,
        &proposed_candidate(),
        JoinType::Additive,
        JoinOptions::default(),
    );

    let mut workspace = Workspace::new();
    for dataset in datasets {
        workspace.add_dataset(dataset);
    }
    workspace.merged = Some(MergedResult::new(
        JoinType::Additive.to_string(),
        "CustomerID",
        outcome.records.clone(),
        outcome.truncated_keys,
    ));

    let path = std::env::temp_dir().join("mergekit_ai_flow_workspace.json");
    workspace.save(&path).unwrap();
    let restored = Workspace::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.datasets.len(), 2);
    let merged = restored.merged.unwrap();
    assert_eq!(merged.join_type, "additive");
    assert_eq!(merged.records.len(), outcome.records.len());
    assert_eq!(
        serde_json::to_string(&merged.records).unwrap(),
        serde_json::to_string(&outcome.records).unwrap()
    );
}
