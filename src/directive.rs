//! The instruction grammar.
//!
//! A template instruction is a comma-separated list of directives, each a
//! colon-separated tagged clause:
//!
//! ```text
//! ruc:<path>[:<regex>[:<template>]]   lookup in rich user content
//! md:<path>[:<vocab>]                 query against structured metadata
//! api                                 literal "create"
//! default:<literal>                   fallback literal
//! err:<message>                       diagnostic only, never yields
//! null                                explicit absent marker
//! ```
//!
//! Instructions are parsed once into a closed [`Directive`] enum and then
//! matched exhaustively by the evaluator. Unknown tags and clauses missing
//! their mandatory parts are configuration errors, reported with the full
//! instruction text so the offending template leaf can be found.

use std::path::PathBuf;

use crate::error::Error;

/// One parsed directive of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Lookup in the rich-user-content record, with optional regex capture
    /// and `$1` substitution template.
    Ruc {
        /// Lowercased, trimmed lookup path (without any `[]` suffix).
        path: String,
        /// Whether the path carried a `[]` suffix ("expect a sequence").
        many: bool,
        /// Regex whose first capture group extracts the value.
        pattern: Option<String>,
        /// Substitution text with a `$1` placeholder.
        template: Option<String>,
    },
    /// Query against the structured-metadata store, with optional
    /// controlled-vocabulary filter.
    Md {
        path: MdPath,
        many: bool,
        vocab: Option<String>,
    },
    /// Always yields the literal `"create"`.
    Api,
    /// Yields its literal verbatim.
    Default(String),
    /// Logs its message; never yields a value.
    Err(String),
    /// Yields absent without stopping the directive scan.
    Null,
}

/// Where an `md` directive gets its query from.
#[derive(Debug, Clone, PartialEq)]
pub enum MdPath {
    /// A metadata field name; a fallback query is synthesized around it.
    Field(String),
    /// `@`-prefixed reference to a query file (relative to the query root).
    QueryFile(PathBuf),
}

/// Parse a full instruction into its ordered directives.
pub fn parse_instruction(text: &str) -> Result<Vec<Directive>, Error> {
    text.split(',')
        .map(|clause| parse_directive(clause, text))
        .collect()
}

fn parse_directive(clause: &str, instruction: &str) -> Result<Directive, Error> {
    let mut parts = clause.split(':');
    let tag = parts.next().unwrap_or_default().trim();
    let parts: Vec<&str> = parts.collect();

    match tag {
        "ruc" => {
            let raw = parts.first().ok_or_else(|| missing_part("ruc", "path", instruction))?;
            let lowered = raw.trim().to_lowercase();
            let (path, many) = strip_many(&lowered);
            // An empty regex part ("ruc:tags[]::...") means no extraction,
            // only substitution.
            let pattern = parts
                .get(1)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            // The substitution text may itself contain colons; everything
            // after the regex part belongs to it. The scalar form is
            // trimmed, the sequence form is used verbatim.
            let template = if parts.len() > 2 {
                let text = parts[2..].join(":");
                let text = if many { text } else { text.trim().to_string() };
                (!text.is_empty()).then_some(text)
            } else {
                None
            };
            Ok(Directive::Ruc {
                path: path.to_string(),
                many,
                pattern,
                template,
            })
        }
        "md" => {
            let raw = parts.first().ok_or_else(|| missing_part("md", "path", instruction))?;
            let (stripped, many) = strip_many(raw.trim());
            let path = match stripped.strip_prefix('@') {
                Some(file) => MdPath::QueryFile(PathBuf::from(file)),
                None => MdPath::Field(stripped.to_string()),
            };
            let vocab = parts.get(1).map(|v| v.trim().to_string());
            Ok(Directive::Md { path, many, vocab })
        }
        "api" => Ok(Directive::Api),
        "default" => {
            let literal = parts.first().ok_or_else(|| missing_part("default", "literal", instruction))?;
            Ok(Directive::Default((*literal).to_string()))
        }
        "err" => {
            let message = parts.first().map(|m| m.trim()).unwrap_or_default();
            Ok(Directive::Err(message.to_string()))
        }
        "null" => Ok(Directive::Null),
        other => Err(Error::Configuration(format!(
            "unknown directive tag '{}' in instruction '{}'",
            other, instruction
        ))),
    }
}

fn strip_many(path: &str) -> (&str, bool) {
    match path.strip_suffix("[]") {
        Some(stripped) => (stripped, true),
        None => (path, false),
    }
}

fn missing_part(tag: &str, part: &str, instruction: &str) -> Error {
    Error::Configuration(format!(
        "directive '{}' is missing its {} in instruction '{}'",
        tag, part, instruction
    ))
}
