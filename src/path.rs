//! Case-insensitive path resolution over nested JSON mappings.
//!
//! Paths are `/`-delimited. Each segment is matched case-insensitively
//! against the mapping's keys at that level. A segment prefixed with `$`
//! is indirect: the segment names another key at the same level whose
//! string value becomes the real segment name. Indirection is single-level;
//! the looked-up name is used as-is.

use serde_json::{Map, Value};
use tracing::debug;

/// Resolve `path` against `record`, returning the matched value or `None`.
///
/// `None` covers every miss: an unmatched segment, a non-mapping value with
/// path segments remaining, or an indirection that does not name a string key.
pub fn resolve_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let map = record.as_object()?;
    let (head, rest) = match path.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    let step;
    let segment = match head.strip_prefix('$') {
        Some(name) => {
            step = lookup(map, name)?.as_str()?.to_string();
            debug!(segment = %step, "indirect path segment");
            step.as_str()
        }
        None => head,
    };

    let value = lookup(map, segment)?;
    match rest {
        None => Some(value),
        Some(rest) => {
            if value.is_object() {
                resolve_path(value, rest)
            } else {
                debug!(%path, "path has remaining segments but value is not a mapping");
                None
            }
        }
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let needle = key.to_lowercase();
    map.iter()
        .find(|(k, _)| k.to_lowercase() == needle)
        .map(|(_, v)| v)
}
