//! Value Sanitizer - Normalizes arbitrary cell values into join-safe scalars
//!
//! Every record that leaves the join engine (workspace storage, CSV export)
//! and every row returned by the external reasoning service passes through
//! this module, so downstream consumers only ever see flat scalar values.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    static ref FILE_EXTENSION: Regex = Regex::new(r"\.[^./\\]+$").unwrap();
    static ref NON_ALPHANUMERIC: Regex = Regex::new(r"[^A-Za-z0-9]").unwrap();
}

/// Closed set of scalar cell kinds. Arbitrary external structures are
/// adapted into this set at the ingestion and reasoning-service boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum CellScalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl CellScalar {
    /// Convert back into a JSON value for storage in a record map.
    pub fn into_value(self) -> Value {
        match self {
            CellScalar::Null => Value::Null,
            CellScalar::Bool(b) => Value::Bool(b),
            CellScalar::Number(n) => Value::Number(n),
            CellScalar::Text(s) => Value::String(s),
        }
    }

    /// Render for a text surface (CSV cell). Null becomes the empty string.
    pub fn csv_field(&self) -> String {
        match self {
            CellScalar::Null => String::new(),
            CellScalar::Bool(b) => b.to_string(),
            CellScalar::Number(n) => n.to_string(),
            CellScalar::Text(s) => s.clone(),
        }
    }
}

/// Reduce a single value to a join-safe scalar. Total and idempotent for
/// values that are already scalar.
///
/// Rules, in order:
/// 1. Null -> Null
/// 2. Array -> elements stringified and joined with `" | "`
/// 3. Object -> compact JSON string
/// 4. String/number/bool -> passed through unchanged
pub fn sanitize(value: &Value) -> CellScalar {
    match value {
        Value::Null => CellScalar::Null,
        Value::Bool(b) => CellScalar::Bool(*b),
        Value::Number(n) => CellScalar::Number(n.clone()),
        Value::String(s) => CellScalar::Text(s.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(element_text)
                .collect::<Vec<_>>()
                .join(" | ");
            CellScalar::Text(joined)
        }
        Value::Object(_) => CellScalar::Text(value.to_string()),
    }
}

/// String form of one array element: nested arrays/objects render as JSON,
/// primitives as their plain string form.
fn element_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Convenience wrapper returning the sanitized value as JSON.
pub fn sanitize_value(value: &Value) -> Value {
    sanitize(value).into_value()
}

/// Sanitize every value in a record, preserving key order.
pub fn sanitize_record(record: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in record {
        out.insert(key.clone(), sanitize_value(value));
    }
    out
}

/// Gate for rows returned by the external reasoning service.
///
/// A non-array response carries no usable rows. Within an array, an element
/// that is not itself an object sanitizes to an empty record rather than
/// failing the whole merge.
pub fn sanitize_external_rows(response: &Value) -> Vec<Map<String, Value>> {
    match response {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(record) => sanitize_record(record),
                _ => Map::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Turn a dataset (file) name into an identifier usable in output column
/// names: the file extension is stripped and every non-alphanumeric
/// character becomes `_`.
pub fn sanitize_dataset_name(name: &str) -> String {
    let stem = FILE_EXTENSION.replace(name, "");
    NON_ALPHANUMERIC.replace_all(&stem, "_").to_string()
}
