//! Error taxonomy for the merge engine.
//!
//! Engine modules return [`Error`]; the assembly layer and CLI wrap it in
//! `anyhow` for context. The split matters because only some failures are
//! recoverable by design: an unresolvable path or an unmatched vocabulary
//! value is a normal absent outcome (not an error at all), while everything
//! in this enum aborts the current run.

use thiserror::Error;

/// Fatal failures raised by the template engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A defect in the run's configuration or template: unknown record kind,
    /// unknown directive tag, malformed regex, missing vocabulary or query file.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The structured-query service answered with a non-2xx status.
    #[error("query execution failed (HTTP {status}): {detail}")]
    QueryExecution { status: u16, detail: String },

    /// The structured-query service could not be reached at all.
    #[error("query request failed: {0}")]
    QueryRequest(String),

    /// The structured-query service answered 2xx with a body that is not JSON.
    #[error("query response error: {0}")]
    QueryResponse(String),

    /// A value was neither a scalar string nor a sequence of strings where
    /// one was required.
    #[error("unexpected value shape: {0}")]
    Shape(String),
}
