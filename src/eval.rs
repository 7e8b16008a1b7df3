//! Instruction evaluation with ordered fallback.
//!
//! An instruction's directives are tried strictly in order and the first
//! one that yields a non-absent result wins; later directives are never
//! consulted after that. The one deliberate exception is `null`, which
//! yields absent and lets the scan continue — a `null` followed by a
//! `default:` therefore still produces the default. That matches the
//! long-observed behavior of templates in the wild and is covered by tests.

use std::fs;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::directive::{parse_instruction, Directive, MdPath};
use crate::error::Error;
use crate::model::{RecordContext, RecordKind, Resolved};
use crate::path::resolve_path;
use crate::query::QueryService;
use crate::vocab::{match_entry, normalize_namespace, VocabCache, NWO_FIELD_NS};

/// Evaluates instructions for one run.
///
/// Holds the run-scoped collaborators: the query service, the vocabulary
/// cache, and the directory that `@file` query references resolve against.
/// Per-record state arrives through [`RecordContext`].
pub struct Evaluator<'a> {
    pub query: &'a dyn QueryService,
    pub vocabs: &'a VocabCache,
    pub query_root: &'a Path,
}

impl Evaluator<'_> {
    /// Evaluate one instruction against the record in `ctx`.
    pub fn evaluate(&self, instruction: &str, ctx: &RecordContext) -> Result<Resolved, Error> {
        let directives = parse_instruction(instruction)?;
        for directive in &directives {
            debug!(?directive, "evaluating directive");
            let result = match directive {
                Directive::Ruc {
                    path,
                    many,
                    pattern,
                    template,
                } => self.eval_ruc(path, *many, pattern.as_deref(), template.as_deref(), ctx, instruction)?,
                Directive::Md { path, vocab, .. } => {
                    self.eval_md(path, vocab.as_deref(), ctx)?
                }
                Directive::Api => Resolved::Text("create".to_string()),
                Directive::Default(literal) => Resolved::Text(literal.clone()),
                Directive::Err(message) => {
                    warn!(record_id = %ctx.record_id, "template diagnostic: {}", message);
                    Resolved::Absent
                }
                // Yields absent but keeps scanning: a later directive in the
                // same instruction may still produce a value.
                Directive::Null => Resolved::Absent,
            };
            if !result.is_absent() {
                return Ok(result);
            }
        }
        Ok(Resolved::Absent)
    }

    fn eval_ruc(
        &self,
        path: &str,
        many: bool,
        pattern: Option<&str>,
        template: Option<&str>,
        ctx: &RecordContext,
        instruction: &str,
    ) -> Result<Resolved, Error> {
        let value = match resolve_path(ctx.ruc, path) {
            Some(value) => value,
            None => {
                debug!(%path, "no value in rich user content");
                return Ok(Resolved::Absent);
            }
        };
        let mut resolved = Resolved::from_json(value, &format!("rich content path '{}'", path))?;

        if let Some(pattern) = pattern {
            if !resolved.is_absent() {
                let regex = compile_capture(pattern, instruction)?;
                resolved = apply_capture(&regex, resolved);
            }
        }

        if let Some(template) = template {
            if !resolved.is_absent() {
                resolved = apply_template(template, resolved, many, path)?;
            }
        }

        Ok(resolved)
    }

    fn eval_md(
        &self,
        path: &MdPath,
        vocab: Option<&str>,
        ctx: &RecordContext,
    ) -> Result<Resolved, Error> {
        let query = self.build_query(path, ctx)?;
        debug!(record_id = %ctx.record_id, "dispatching metadata query");

        let response = self.query.execute(&query, ctx.kind.database())?;
        let mut resolved = match response {
            None => Resolved::Absent,
            Some(value) => Resolved::from_json(&value, "query response")?,
        };
        // An empty string response carries no information either.
        if resolved == Resolved::Text(String::new()) {
            resolved = Resolved::Absent;
        }

        if let Some(vocab) = vocab {
            if !resolved.is_absent() {
                resolved = self.filter_vocab(vocab, resolved)?;
            }
        }

        Ok(resolved)
    }

    fn build_query(&self, path: &MdPath, ctx: &RecordContext) -> Result<String, Error> {
        match path {
            MdPath::QueryFile(file) => {
                let full: PathBuf = self.query_root.join(file);
                let text = fs::read_to_string(&full).map_err(|e| {
                    Error::Configuration(format!(
                        "cannot read query file {}: {}",
                        full.display(),
                        e
                    ))
                })?;
                Ok(text.replace("{ID}", ctx.record_id))
            }
            MdPath::Field(field) => Ok(fallback_query(ctx.kind, field, ctx.record_id)),
        }
    }

    /// Apply a controlled-vocabulary filter to a query result.
    ///
    /// Per element: namespace-normalize first — canonical NWO-field URIs are
    /// kept verbatim — otherwise match against the vocabulary table. The
    /// collected tokens are de-duplicated in first-seen order; an empty
    /// collection is absent, allowing fallback to the next directive.
    fn filter_vocab(&self, vocab: &str, resolved: Resolved) -> Result<Resolved, Error> {
        let table = self.vocabs.get(vocab)?;
        let values = match resolved {
            Resolved::Absent => return Ok(Resolved::Absent),
            Resolved::Text(s) => vec![s],
            Resolved::Many(items) => items,
        };

        let mut tokens: Vec<String> = Vec::new();
        for value in values {
            let token = match normalize_namespace(&value) {
                Some(normalized) if normalized.starts_with(NWO_FIELD_NS) => normalized,
                _ => match match_entry(&table, &value) {
                    Some(token) => token,
                    None => {
                        debug!(%vocab, %value, "no vocabulary match");
                        continue;
                    }
                },
            };
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }

        if tokens.is_empty() {
            Ok(Resolved::Absent)
        } else {
            Ok(Resolved::Many(tokens))
        }
    }
}

/// Synthesize the fallback query used when an `md` path names a plain field.
///
/// The record's identifying field differs per kind (`id` for datasets,
/// `identifier` for tools); the stored records are the XML rendering of
/// JSON, hence the `js:` namespace and the `xml-to-json` call.
fn fallback_query(kind: RecordKind, field: &str, record_id: &str) -> String {
    format!(
        r#"declare namespace js="http://www.w3.org/2005/xpath-functions";

for $i in js:map
let $ID:="{record_id}"
 where $i/js:string[@key='{id_field}']=$ID
 return xml-to-json($i/js:*[@key='{field}'][1])"#,
        record_id = record_id,
        id_field = kind.id_field(),
        field = field,
    )
}

/// Compile a capture regex with dot-matches-newline semantics.
///
/// A malformed pattern, or one with no capture group, is a template defect
/// and fails fast with the offending instruction in the message.
pub(crate) fn compile_capture(pattern: &str, instruction: &str) -> Result<Regex, Error> {
    let regex = RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| {
            Error::Configuration(format!(
                "invalid regex '{}' in instruction '{}': {}",
                pattern, instruction, e
            ))
        })?;
    if regex.captures_len() < 2 {
        return Err(Error::Configuration(format!(
            "regex '{}' in instruction '{}' has no capture group",
            pattern, instruction
        )));
    }
    Ok(regex)
}

/// Extract the first capture group.
///
/// Sequences keep non-matching elements unchanged; a non-matching scalar
/// is absent.
fn apply_capture(regex: &Regex, resolved: Resolved) -> Resolved {
    match resolved {
        Resolved::Absent => Resolved::Absent,
        Resolved::Text(text) => match regex.captures(&text) {
            Some(caps) => match caps.get(1) {
                Some(group) => Resolved::Text(group.as_str().to_string()),
                None => Resolved::Absent,
            },
            None => Resolved::Absent,
        },
        Resolved::Many(items) => Resolved::Many(
            items
                .into_iter()
                .map(|item| {
                    regex
                        .captures(&item)
                        .and_then(|caps| caps.get(1).map(|g| g.as_str().to_string()))
                        .unwrap_or(item)
                })
                .collect(),
        ),
    }
}

/// Substitute the resolved value into a `$1` template.
///
/// In the sequence form, elements that already look like absolute URIs are
/// used verbatim instead of being substituted. In the scalar form, a
/// sequence value is a shape error.
fn apply_template(
    template: &str,
    resolved: Resolved,
    many: bool,
    path: &str,
) -> Result<Resolved, Error> {
    if many {
        let items = match resolved {
            Resolved::Absent => return Ok(Resolved::Absent),
            Resolved::Text(s) => vec![s],
            Resolved::Many(items) => items,
        };
        Ok(Resolved::Many(
            items
                .into_iter()
                .map(|item| {
                    if item.starts_with("http://") || item.starts_with("https://") {
                        item
                    } else {
                        template.replace("$1", &item)
                    }
                })
                .collect(),
        ))
    } else {
        match resolved {
            Resolved::Absent => Ok(Resolved::Absent),
            Resolved::Text(s) => Ok(Resolved::Text(template.replace("$1", &s))),
            Resolved::Many(_) => Err(Error::Shape(format!(
                "substitution template for '{}' expects a scalar but the path resolved to a sequence; mark the path with []",
                path
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;

    /// Serves canned responses keyed by (database, substring-of-query).
    struct StubService {
        responses: Vec<(&'static str, Value)>,
    }

    impl QueryService for StubService {
        fn execute(&self, query: &str, _database: &str) -> Result<Option<Value>, Error> {
            Ok(self
                .responses
                .iter()
                .find(|(needle, _)| query.contains(needle))
                .map(|(_, value)| value.clone()))
        }
    }

    /// A service that must never be reached.
    struct UnreachableService;

    impl QueryService for UnreachableService {
        fn execute(&self, query: &str, _database: &str) -> Result<Option<Value>, Error> {
            panic!("query service called unexpectedly: {}", query);
        }
    }

    fn evaluator<'a>(query: &'a dyn QueryService, vocabs: &'a VocabCache) -> Evaluator<'a> {
        Evaluator {
            query,
            vocabs,
            query_root: Path::new("."),
        }
    }

    fn ctx<'a>(ruc: &'a Value) -> RecordContext<'a> {
        RecordContext {
            ruc,
            kind: RecordKind::Datasets,
            record_id: "rec-1",
        }
    }

    #[test]
    fn test_ruc_simple_lookup() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"Title": "My Dataset"});
        let res = ev.evaluate("ruc:title", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("My Dataset".into()));
    }

    #[test]
    fn test_ruc_regex_capture_spans_newlines() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"overview": "# Title\n### Data\nrest"});
        let res = ev
            .evaluate(r"ruc:overview:^.*(### Data.*)$", &ctx(&ruc))
            .unwrap();
        assert_eq!(res, Resolved::Text("### Data\nrest".into()));
    }

    #[test]
    fn test_ruc_regex_no_match_falls_through_to_default() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"overview": "nothing here"});
        let res = ev
            .evaluate(r"ruc:overview:(### Data.*),default:missing", &ctx(&ruc))
            .unwrap();
        assert_eq!(res, Resolved::Text("missing".into()));
    }

    #[test]
    fn test_ruc_sequence_regex_keeps_unmatched_elements() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"links": ["see: a", "plain"]});
        let res = ev.evaluate(r"ruc:links[]:see. (.*)", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Many(vec!["a".into(), "plain".into()]));
    }

    #[test]
    fn test_ruc_sequence_template_uri_passthrough() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"tags": ["http://x.org/a", "science"]});
        let res = ev.evaluate("ruc:tags[]::Category: $1", &ctx(&ruc)).unwrap();
        assert_eq!(
            res,
            Resolved::Many(vec!["http://x.org/a".into(), "Category: science".into()])
        );
    }

    #[test]
    fn test_ruc_scalar_template_substitution() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"name": "corpus"});
        let res = ev.evaluate("ruc:name:(.*): about $1 ", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("about corpus".into()));
    }

    #[test]
    fn test_ruc_malformed_regex_names_instruction() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"overview": "x"});
        let err = ev.evaluate("ruc:overview:(unclosed", &ctx(&ruc)).unwrap_err();
        assert!(err.to_string().contains("ruc:overview:(unclosed"));
    }

    #[test]
    fn test_regex_without_capture_group_is_error() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({"overview": "x"});
        assert!(ev.evaluate("ruc:overview:data.*", &ctx(&ruc)).is_err());
    }

    #[test]
    fn test_default_short_circuits_before_md() {
        let vocabs = VocabCache::new(".");
        // UnreachableService panics if the md directive were dispatched.
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({});
        let res = ev.evaluate("default:create,md:status", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("create".into()));
    }

    #[test]
    fn test_null_does_not_stop_the_scan() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({});
        let res = ev.evaluate("null,default:foo", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("foo".into()));
    }

    #[test]
    fn test_api_yields_create() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({});
        let res = ev.evaluate("api:operation", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("create".into()));
    }

    #[test]
    fn test_err_never_yields() {
        let vocabs = VocabCache::new(".");
        let ev = evaluator(&UnreachableService, &vocabs);
        let ruc = json!({});
        let res = ev
            .evaluate("err:there is no learn!,default:fallback", &ctx(&ruc))
            .unwrap();
        assert_eq!(res, Resolved::Text("fallback".into()));
    }

    #[test]
    fn test_md_field_response() {
        let vocabs = VocabCache::new(".");
        let stub = StubService {
            responses: vec![("@key='description'", json!(["a description"]))],
        };
        let ev = evaluator(&stub, &vocabs);
        let ruc = json!({});
        let res = ev.evaluate("md:description", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Many(vec!["a description".into()]));
    }

    #[test]
    fn test_md_fallback_query_uses_kind_id_field() {
        let query = fallback_query(RecordKind::Tools, "license", "tool-9");
        assert!(query.contains("@key='identifier'"));
        assert!(query.contains("tool-9"));
        assert!(query.contains("@key='license'"));
        let query = fallback_query(RecordKind::Datasets, "license", "ds-1");
        assert!(query.contains("@key='id'"));
    }

    #[test]
    fn test_md_empty_response_falls_through() {
        let vocabs = VocabCache::new(".");
        let stub = StubService {
            responses: vec![("@key='status'", json!([]))],
        };
        let ev = evaluator(&stub, &vocabs);
        let ruc = json!({});
        let res = ev.evaluate("md:status,default:active", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("active".into()));
    }

    #[test]
    fn test_md_query_file_substitutes_record_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("queries")).unwrap();
        fs::write(
            dir.path().join("queries/authors.rq"),
            "for $i where $i/id='{ID}' return $i",
        )
        .unwrap();

        let vocabs = VocabCache::new(".");
        let stub = StubService {
            responses: vec![("$i/id='rec-1'", json!("Ada Lovelace"))],
        };
        let ev = Evaluator {
            query: &stub,
            vocabs: &vocabs,
            query_root: dir.path(),
        };
        let ruc = json!({});
        let res = ev.evaluate("md:@queries/authors.rq", &ctx(&ruc)).unwrap();
        assert_eq!(res, Resolved::Text("Ada Lovelace".into()));
    }

    #[test]
    fn test_md_missing_query_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let vocabs = VocabCache::new(".");
        let ev = Evaluator {
            query: &UnreachableService,
            vocabs: &vocabs,
            query_root: dir.path(),
        };
        let ruc = json!({});
        let err = ev.evaluate("md:@queries/gone.rq", &ctx(&ruc)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_md_vocab_filter_matches_and_dedups_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("mediaTypes.json"),
            r#"[{"title": "Plain Text", "index": "7.23"},
                {"title": "Video", "index": "7.9"}]"#,
        )
        .unwrap();

        let vocabs = VocabCache::new(dir.path());
        let stub = StubService {
            responses: vec![(
                "@key='mediaType'",
                json!(["video", "plain text", "Video", "unknown"]),
            )],
        };
        let ev = evaluator(&stub, &vocabs);
        let ruc = json!({});
        let res = ev.evaluate("md:mediaType[]:mediaTypes", &ctx(&ruc)).unwrap();
        assert_eq!(
            res,
            Resolved::Many(vec!["7.9 Video".into(), "7.23 Plain Text".into()])
        );
    }

    #[test]
    fn test_md_vocab_keeps_nwo_uris_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("researchDomains.json"), "[]").unwrap();

        let vocabs = VocabCache::new(dir.path());
        let stub = StubService {
            responses: vec![(
                "@key='applicationCategory'",
                json!(["nwo:ComputationalLinguistics", "bad > value"]),
            )],
        };
        let ev = evaluator(&stub, &vocabs);
        let ruc = json!({});
        let res = ev
            .evaluate("md:applicationCategory[]:researchDomains", &ctx(&ruc))
            .unwrap();
        assert_eq!(
            res,
            Resolved::Many(vec![
                "https://w3id.org/nwo-research-fields#ComputationalLinguistics".into()
            ])
        );
    }

    #[test]
    fn test_md_vocab_no_match_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mediaTypes.json"), "[]").unwrap();

        let vocabs = VocabCache::new(dir.path());
        let stub = StubService {
            responses: vec![("@key='mediaType'", json!(["unknown"]))],
        };
        let ev = evaluator(&stub, &vocabs);
        let ruc = json!({});
        let res = ev
            .evaluate("md:mediaType[]:mediaTypes,null", &ctx(&ruc))
            .unwrap();
        assert_eq!(res, Resolved::Absent);
    }
}
