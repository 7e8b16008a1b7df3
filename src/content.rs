//! Rich-user-content loading and record discovery.
//!
//! RUC files are per-identifier JSON mappings. A record without one gets a
//! minimal synthetic RUC so the template can still resolve `identifier`
//! and fall back on the record id as a title.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

/// Load the RUC for `record_id`, or synthesize a minimal one.
pub fn load_ruc(content_dir: &Path, record_id: &str) -> Result<Value> {
    let path = content_dir.join(format!("{}.json", record_id));
    if !path.exists() {
        debug!(%record_id, "no rich user content, using minimal record");
        return Ok(minimal_ruc(record_id));
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read rich user content: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid rich user content JSON: {}", path.display()))
}

/// The minimal RUC: just the identifier, with the identifier doubling as
/// a title until the template overrides it from the metadata side.
pub fn minimal_ruc(record_id: &str) -> Value {
    json!({
        "identifier": record_id,
        "title": record_id,
    })
}

/// Collect record identifiers from a directory of harvested `*.json` records.
///
/// The identifier is the file stem, so `some.id.json` yields `some.id`.
/// Sorted for a deterministic processing order.
pub fn list_record_ids(records_dir: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in WalkDir::new(records_dir).min_depth(1).max_depth(1) {
        let entry = entry
            .with_context(|| format!("Failed to scan records dir: {}", records_dir.display()))?;
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
    }
    ids.sort();
    Ok(ids)
}
