//! Controlled-vocabulary normalization.
//!
//! Two concerns live here:
//! - namespace normalization of raw query results, so shorthand references
//!   to the NWO research-field vocabulary become full canonical URIs;
//! - matching free-text values against named vocabulary tables (JSON files
//!   of `{title, index}` entries), producing `"{index} {title}"` tokens.
//!
//! Vocabulary tables are loaded lazily on first reference and cached for
//! the rest of the run. The cache is never invalidated mid-run, so the
//! files must not change while a run is in flight.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::debug;

use crate::error::Error;

/// Canonical URI prefix for the NWO research-fields vocabulary.
pub const NWO_FIELD_NS: &str = "https://w3id.org/nwo-research-fields#";

/// Normalize a raw value's namespace, or reject it as malformed.
///
/// - `nwo:`-shorthand values are rewritten onto [`NWO_FIELD_NS`].
/// - Values already carrying a recognized authority (`w3id.org`,
///   `vocabs.dariah.eu`) pass through unchanged.
/// - Values containing `>` are malformed and yield `None`.
/// - Everything else passes through unchanged.
pub fn normalize_namespace(value: &str) -> Option<String> {
    if value.contains("nwo") {
        return Some(match value.strip_prefix("nwo:") {
            Some(rest) => format!("{}{}", NWO_FIELD_NS, rest),
            None => value.to_string(),
        });
    }
    if value.contains("w3id.org") || value.contains("vocabs.dariah.eu") {
        return Some(value.to_string());
    }
    if value.contains('>') {
        debug!(%value, "value contains '>' and is ignored");
        return None;
    }
    Some(value.to_string())
}

/// One entry of a vocabulary table.
///
/// `index` is an ordering key like `"7.23"`; some vocabularies (e.g. status
/// lists) carry none, in which case the matched token is the bare title.
#[derive(Debug, Clone, Deserialize)]
pub struct VocabEntry {
    pub title: String,
    pub index: Option<String>,
}

/// Match `value` against a vocabulary's titles, case-insensitively and
/// ignoring surrounding whitespace. Returns the canonical token
/// (`"{index} {title}"`, or just the title when the entry has no index).
/// Titles are effectively unique within a vocabulary; the first match wins.
pub fn match_entry(entries: &[VocabEntry], value: &str) -> Option<String> {
    let needle = value.trim().to_lowercase();
    entries
        .iter()
        .find(|entry| entry.title.trim().to_lowercase() == needle)
        .map(|entry| {
            let title = entry.title.trim();
            match &entry.index {
                Some(index) => format!("{} {}", index, title),
                None => title.to_string(),
            }
        })
}

/// Lazily-loaded, run-scoped cache of vocabulary tables.
///
/// Owned by the run and handed to the evaluator, rather than held as
/// process-global state. The mutex is held across the file load so that
/// concurrent first references to the same vocabulary are serialized.
#[derive(Debug)]
pub struct VocabCache {
    dir: PathBuf,
    tables: Mutex<HashMap<String, Arc<Vec<VocabEntry>>>>,
}

impl VocabCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a vocabulary table, loading `<dir>/<name>.json` on first use.
    ///
    /// A missing or unparsable file is a configuration error: the template
    /// named a vocabulary the run cannot supply.
    pub fn get(&self, name: &str) -> Result<Arc<Vec<VocabEntry>>, Error> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(table) = tables.get(name) {
            return Ok(Arc::clone(table));
        }

        let path = self.dir.join(format!("{}.json", name));
        debug!(vocab = %name, path = %path.display(), "loading vocabulary table");
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read vocabulary '{}' at {}: {}",
                name,
                path.display(),
                e
            ))
        })?;
        let entries: Vec<VocabEntry> = serde_json::from_str(&text).map_err(|e| {
            Error::Configuration(format!(
                "vocabulary '{}' at {} is not a valid table: {}",
                name,
                path.display(),
                e
            ))
        })?;

        let table = Arc::new(entries);
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }
}
