//! Core data types shared across the merge engine.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::Error;

/// The two kinds of records the engine knows how to merge.
///
/// The kind selects both the query database and the identifying field used
/// when a fallback query is synthesized for an `md` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Datasets,
    Tools,
}

impl RecordKind {
    /// Name of the field that identifies a record in the metadata store.
    pub fn id_field(&self) -> &'static str {
        match self {
            RecordKind::Datasets => "id",
            RecordKind::Tools => "identifier",
        }
    }

    /// Name of the query-service database holding this kind of record.
    pub fn database(&self) -> &'static str {
        match self {
            RecordKind::Datasets => "datasets",
            RecordKind::Tools => "tools",
        }
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "datasets" => Ok(RecordKind::Datasets),
            "tools" => Ok(RecordKind::Tools),
            other => Err(Error::Configuration(format!(
                "invalid record kind '{}'; valid kinds are 'datasets' and 'tools'",
                other
            ))),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.database())
    }
}

/// The outcome of resolving one instruction or directive.
///
/// `Absent` is distinct from an explicit null in the output: absent fields
/// are omitted, while a resolved literal `"null"` becomes a JSON null.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// No value was produced; fallback to the next directive is allowed.
    Absent,
    /// A single scalar string.
    Text(String),
    /// An ordered sequence of strings.
    Many(Vec<String>),
}

impl Resolved {
    /// An empty sequence counts as absent for directive fallback.
    pub fn is_absent(&self) -> bool {
        match self {
            Resolved::Absent => true,
            Resolved::Text(_) => false,
            Resolved::Many(items) => items.is_empty(),
        }
    }

    /// Convert a JSON value into a resolved value.
    ///
    /// Accepts strings, arrays of strings, and null (absent). Anything else
    /// is a [`Error::Shape`] failure; `what` names the source in the message.
    pub fn from_json(value: &Value, what: &str) -> Result<Resolved, Error> {
        match value {
            Value::Null => Ok(Resolved::Absent),
            Value::String(s) => Ok(Resolved::Text(s.clone())),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        other => {
                            return Err(Error::Shape(format!(
                                "{}: sequence element is not a string: {}",
                                what, other
                            )))
                        }
                    }
                }
                Ok(Resolved::Many(out))
            }
            other => Err(Error::Shape(format!(
                "{}: expected a string or a sequence of strings, got {}",
                what, other
            ))),
        }
    }

    /// Render as a JSON value; `None` when absent.
    pub fn into_json(self) -> Option<Value> {
        match self {
            Resolved::Absent => None,
            Resolved::Text(s) => Some(Value::String(s)),
            Resolved::Many(items) => {
                Some(Value::Array(items.into_iter().map(Value::String).collect()))
            }
        }
    }
}

/// Everything the evaluator needs to know about the record being merged.
///
/// Borrowed per record; the template and vocabulary cache live for the
/// whole run, this context only for one record's traversal.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    /// The rich-user-content record for this identifier (possibly minimal).
    pub ruc: &'a Value,
    /// Which metadata store the record belongs to.
    pub kind: RecordKind,
    /// The record identifier, substituted into queries.
    pub record_id: &'a str,
}
