//! Ingestion - Converts uploaded CSV/JSON bytes into [`Dataset`]s
//!
//! The only place arbitrary external structure enters the system. Cells are
//! coerced into the closed scalar set here, so everything downstream can
//! assume flat scalar rows.

use crate::dataset::Dataset;
use crate::error::{MergeError, Result};
use crate::sanitize::sanitize_value;
use csv::ReaderBuilder;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// Parse CSV text into a dataset named after the uploaded file.
pub fn dataset_from_csv(name: &str, csv_text: &str) -> Result<Dataset> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| MergeError::Ingestion(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|e| MergeError::Ingestion(format!("Failed to read CSV record: {}", e)))?;
        let mut row = Map::new();
        for (idx, header) in headers.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("");
            row.insert(header.clone(), coerce_cell(cell));
        }
        rows.push(row);
    }

    info!("Ingested {} rows from {}", rows.len(), name);
    Ok(Dataset::new(name, headers, rows))
}

/// Parse a JSON array of objects into a dataset. Column order is the union
/// of row keys in first-seen order. Nested values are sanitized into
/// scalars at this boundary.
pub fn dataset_from_json(name: &str, json_text: &str) -> Result<Dataset> {
    let parsed: Value = serde_json::from_str(json_text)
        .map_err(|e| MergeError::Ingestion(format!("Invalid JSON in {}: {}", name, e)))?;

    let Value::Array(items) = parsed else {
        return Err(MergeError::Ingestion(format!(
            "{} must contain a JSON array of records",
            name
        )));
    };

    let mut columns: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for item in &items {
        let Value::Object(record) = item else {
            return Err(MergeError::Ingestion(format!(
                "{} contains a non-record entry",
                name
            )));
        };
        let mut row = Map::new();
        for (key, value) in record {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
            row.insert(key.clone(), sanitize_value(value));
        }
        rows.push(row);
    }

    info!("Ingested {} rows from {}", rows.len(), name);
    Ok(Dataset::new(name, columns, rows))
}

/// Load a dataset from disk, dispatching on the file extension.
pub fn dataset_from_path(path: &Path) -> Result<Dataset> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| MergeError::Ingestion(format!("Invalid path: {}", path.display())))?;
    let text = std::fs::read_to_string(path)?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => dataset_from_json(&name, &text),
        _ => dataset_from_csv(&name, &text),
    }
}

/// Coerce a raw CSV cell into a scalar: empty -> null, then bool, then
/// integer, then float, else trimmed string.
fn coerce_cell(s: &str) -> Value {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Number(i.into());
    }

    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    Value::String(trimmed.to_string())
}
