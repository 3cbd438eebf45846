//! Reasoning service client
//!
//! Narrow interface to the external LLM: propose join candidates, draft a
//! merge plan, execute a semantic merge, and chat over the workspace.
//! Every response is untrusted input - candidate JSON is parsed
//! defensively and semantic-merge rows are routed through the sanitizer
//! before they touch the rest of the pipeline.

use crate::dataset::{Dataset, DatasetSummary, JoinCandidate};
use crate::error::{MergeError, Result};
use crate::sanitize::sanitize_external_rows;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The operations the rest of the system may ask of the reasoning service.
/// The join engine never calls these; orchestration owns the boundary.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Ranked join-key candidates for the given dataset summaries.
    async fn propose_candidates(&self, summaries: &[DatasetSummary]) -> Result<Vec<JoinCandidate>>;

    /// Human-readable plan describing how the files would be merged.
    async fn draft_merge_plan(
        &self,
        summaries: &[DatasetSummary],
        candidate: &JoinCandidate,
    ) -> Result<String>;

    /// Delegate matching and consolidation to the service. Returns already
    /// sanitized flat records; a malformed response yields no rows.
    async fn execute_semantic_merge(
        &self,
        datasets: &[Dataset],
        instructions: &str,
    ) -> Result<Vec<Map<String, Value>>>;

    /// Conversational answer about the workspace.
    async fn chat(&self, question: &str, context: &str) -> Result<String>;
}

pub struct ReasoningClient {
    api_key: String,
    base_url: String,
    model: String,
}

/// Candidate shape as the service returns it (camelCase, fields optional).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateResponse {
    key_name: String,
    #[serde(default)]
    column_mappings: HashMap<String, String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    issues: Vec<String>,
}

impl ReasoningClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn call_llm(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        // Offline fallback used by tests and keyless CLI runs.
        if self.api_key == "dummy-api-key" {
            return Ok("[]".to_string());
        }

        let client = reqwest::Client::new();
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a precise JSON-only responder. Always return valid JSON, no other text."},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
            "max_tokens": max_tokens
        });

        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MergeError::Reasoning(format!("LLM API call failed: {}", e)))?;

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| MergeError::Reasoning(format!("Failed to parse LLM response: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| MergeError::Reasoning("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl ReasoningService for ReasoningClient {
    async fn propose_candidates(&self, summaries: &[DatasetSummary]) -> Result<Vec<JoinCandidate>> {
        let context = summaries_context(summaries)?;

        let prompt = format!(
            r#"You are a data merge assistant. The user uploaded these files:

{}

Identify columns that could serve as a shared join key across the files.
Return ONLY a JSON array, best candidate first, in this exact format:

[
  {{
    "keyName": "CustomerID",
    "columnMappings": {{"customers.csv": "CustomerID", "orders.csv": "Cust_Ref_ID"}},
    "confidence": 0.95,
    "reasoning": "Both columns contain customer identifiers with matching values",
    "issues": []
  }}
]

Only return the JSON array, no other text."#,
            context
        );

        let response = self.call_llm(&prompt, 1500).await?;
        parse_candidates_response(&response)
    }

    async fn draft_merge_plan(
        &self,
        summaries: &[DatasetSummary],
        candidate: &JoinCandidate,
    ) -> Result<String> {
        if self.api_key == "dummy-api-key" {
            return Ok(format!(
                "Merge the files on '{}' using the mapped key columns.",
                candidate.key_name
            ));
        }

        let context = summaries_context(summaries)?;
        let candidate_json = serde_json::to_string_pretty(candidate)?;

        let prompt = format!(
            r#"You are a data merge assistant. The user uploaded these files:

{}

They chose this join key:

{}

Describe in 3-5 short sentences how the merge will work, what the result
will contain, and anything the user should double-check. Plain text only."#,
            context, candidate_json
        );

        self.call_llm(&prompt, 600).await
    }

    async fn execute_semantic_merge(
        &self,
        datasets: &[Dataset],
        instructions: &str,
    ) -> Result<Vec<Map<String, Value>>> {
        let payload = serde_json::to_string(
            &datasets
                .iter()
                .map(|ds| {
                    serde_json::json!({
                        "name": ds.name,
                        "columns": ds.columns,
                        "rows": ds.rows,
                    })
                })
                .collect::<Vec<_>>(),
        )?;

        let prompt = format!(
            r#"You are a data merge assistant. Merge the following files into a
single flat array of records. {}

Files:
{}

Return ONLY a JSON array of flat objects (no nested values), no other text."#,
            instructions, payload
        );

        let response = self.call_llm(&prompt, 4000).await?;
        let parsed: Value = serde_json::from_str(strip_json_fences(&response))
            .map_err(|e| MergeError::Reasoning(format!("Failed to parse merge response: {}", e)))?;

        // Non-array or non-object elements degrade to no/empty rows here.
        Ok(sanitize_external_rows(&parsed))
    }

    async fn chat(&self, question: &str, context: &str) -> Result<String> {
        if self.api_key == "dummy-api-key" {
            return Ok("I need a reasoning service connection to answer that.".to_string());
        }

        let prompt = format!(
            r#"You are a data merge assistant. Workspace context:

{}

User question: "{}"

Answer concisely in plain text."#,
            context, question
        );

        self.call_llm(&prompt, 800).await
    }
}

fn summaries_context(summaries: &[DatasetSummary]) -> Result<String> {
    let blocks: Vec<String> = summaries
        .iter()
        .map(|s| {
            Ok(format!(
                "- {} ({} rows)\n  columns: {}\n  sample: {}",
                s.name,
                s.row_count,
                s.columns.join(", "),
                serde_json::to_string(&s.sample_rows)?
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(blocks.join("\n"))
}

fn parse_candidates_response(response: &str) -> Result<Vec<JoinCandidate>> {
    let candidates: Vec<CandidateResponse> = serde_json::from_str(strip_json_fences(response))
        .map_err(|e| MergeError::Reasoning(format!("Failed to parse candidates: {}", e)))?;

    Ok(candidates
        .into_iter()
        .map(|c| JoinCandidate {
            key_name: c.key_name,
            column_mappings: c.column_mappings,
            confidence: c.confidence,
            reasoning: c.reasoning,
            issues: c.issues,
        })
        .collect())
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}
