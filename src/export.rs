//! Export - Serializes merged records for download
//!
//! The CSV surface derives its header row from the first record's key set;
//! columns introduced only by later records are not emitted. That matches
//! the long-standing sheet-writer behavior downstream tooling expects.

use crate::error::{MergeError, Result};
use crate::sanitize::sanitize;
use serde_json::{Map, Value};
use std::path::Path;

/// Render records as CSV text. An empty record set renders as an empty
/// document. Null values render as empty cells.
pub fn records_to_csv(records: &[Map<String, Value>]) -> Result<String> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };

    let headers: Vec<&String> = first.keys().collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers)?;

    for record in records {
        let fields: Vec<String> = headers
            .iter()
            .map(|header| {
                let value = record.get(*header).unwrap_or(&Value::Null);
                sanitize(value).csv_field()
            })
            .collect();
        writer.write_record(&fields)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| MergeError::Export(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| MergeError::Export(format!("Invalid CSV bytes: {}", e)))
}

/// Write records as CSV to a file.
pub fn write_records_csv(records: &[Map<String, Value>], path: &Path) -> Result<()> {
    let text = records_to_csv(records)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Render records as pretty-printed JSON.
pub fn records_to_json(records: &[Map<String, Value>]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
