//! Record assembly: the thin orchestration around the template engine.
//!
//! Loads the template once, builds the run-scoped evaluator, and merges
//! each record in turn, persisting the result. Any evaluation failure
//! aborts the whole run; no partial output is written for the failing
//! record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::content::{list_record_ids, load_ruc};
use crate::eval::Evaluator;
use crate::model::{RecordContext, RecordKind};
use crate::query::{BasexService, QueryService};
use crate::traverse::traverse;
use crate::vocab::VocabCache;

/// Merge all records of `kind` (or just `only_id`) using the configured
/// HTTP query service.
pub fn run_transform(config: &Config, kind: RecordKind, only_id: Option<&str>) -> Result<usize> {
    let service = BasexService::new(
        &config.service.url,
        &config.service.user,
        &config.service.password,
        config.service.timeout_secs,
    )?;
    transform_all(config, &service, kind, only_id)
}

/// Merge records against any [`QueryService`] implementation.
///
/// Split out from [`run_transform`] so the service can be substituted in
/// tests. Returns the number of records written.
pub fn transform_all(
    config: &Config,
    service: &dyn QueryService,
    kind: RecordKind,
    only_id: Option<&str>,
) -> Result<usize> {
    let template = load_template(&config.paths.template)?;
    let vocabs = VocabCache::new(&config.paths.vocab_dir);
    let evaluator = Evaluator {
        query: service,
        vocabs: &vocabs,
        query_root: &config.paths.query_root,
    };

    let ids = match only_id {
        Some(id) => vec![id.to_string()],
        None => list_record_ids(&config.paths.records_dir)?,
    };
    info!(count = ids.len(), %kind, "merging records");

    for id in &ids {
        let ruc = load_ruc(&config.paths.content_dir, id)?;
        let ctx = RecordContext {
            ruc: &ruc,
            kind,
            record_id: id,
        };
        let merged = traverse(&template, &evaluator, &ctx)
            .with_context(|| format!("Failed to merge record '{}'", id))?;
        write_record(&config.paths.output_dir, kind, id, &merged)?;
        info!(record_id = %id, "record merged");
    }

    Ok(ids.len())
}

/// Load the instruction template, shared read-only across all records.
pub fn load_template(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Template is not valid JSON: {}", path.display()))
}

/// Persist one merged record as `<output_dir>/processed_<kind>/<id>_processed.json`.
///
/// The downstream consumer expects an array of single-entry mappings, one
/// per output field, so the top-level mapping is unrolled on the way out.
pub fn write_record(output_dir: &Path, kind: RecordKind, record_id: &str, merged: &Value) -> Result<()> {
    let fields = merged.as_object().with_context(|| {
        format!(
            "merged record '{}' is not a mapping; the template root must be an object",
            record_id
        )
    })?;

    let unrolled: Vec<Value> = fields
        .iter()
        .map(|(key, value)| {
            let mut entry = serde_json::Map::new();
            entry.insert(key.clone(), value.clone());
            Value::Object(entry)
        })
        .collect();

    let dir = output_dir.join(format!("processed_{}", kind));
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output dir: {}", dir.display()))?;
    let path = dir.join(format!("{}_processed.json", record_id));
    let text = serde_json::to_string_pretty(&unrolled)?;
    fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
