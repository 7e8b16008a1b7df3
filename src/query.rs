//! Client interface to the external structured-query service.
//!
//! The engine only needs one operation: run a query against a named
//! database and get back a JSON value (or nothing). [`QueryService`] keeps
//! that seam narrow so tests can substitute an in-memory stub, and
//! [`BasexService`] implements it against a BaseX REST endpoint.

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;

/// The structured-query service as the engine sees it.
pub trait QueryService: Send + Sync {
    /// Execute `query` against `database`.
    ///
    /// Returns `Ok(None)` for an empty successful response body. Non-2xx
    /// responses are [`Error::QueryExecution`]; a successful body that is
    /// not JSON is [`Error::QueryResponse`]. Both abort the run.
    fn execute(&self, query: &str, database: &str) -> Result<Option<Value>, Error>;
}

/// HTTP client for a BaseX REST endpoint.
pub struct BasexService {
    base_url: String,
    user: String,
    password: String,
    client: reqwest::blocking::Client,
}

impl BasexService {
    /// Build a client for `base_url` (e.g. `http://basex:8080/rest`).
    ///
    /// The timeout bounds every query call; the engine itself defines no
    /// timeout semantics, so a generous value here is the only guard
    /// against a hung service.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into(),
            user: user.into(),
            password: password.into(),
            client,
        })
    }
}

impl QueryService for BasexService {
    fn execute(&self, query: &str, database: &str) -> Result<Option<Value>, Error> {
        let body = wrap_query(query);
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), database);
        debug!(%url, "executing query");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .map_err(|e| Error::QueryRequest(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::QueryRequest(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::QueryExecution {
                status: status.as_u16(),
                detail: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(None);
        }

        let value = serde_json::from_str(&text).map_err(|e| {
            Error::QueryResponse(format!("unparsable response for query '{}': {}", query, e))
        })?;
        Ok(Some(value))
    }
}

/// Wrap a query text in the REST `<query>` envelope.
///
/// `js:`-namespaced tags inside the query text must be entity-escaped or
/// the envelope's XML parser would swallow them.
fn wrap_query(query: &str) -> String {
    let escaped = query.replace("<js:", "&lt;js:").replace("</js:", "&lt;/js:");
    format!("<query>\n  <text>\n    {}\n  </text>\n</query>", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_query_escapes_js_tags() {
        let wrapped = wrap_query("return <js:string>x</js:string>");
        assert!(wrapped.contains("&lt;js:string>"));
        assert!(wrapped.contains("&lt;/js:string>"));
        assert!(wrapped.starts_with("<query>"));
        assert!(wrapped.trim_end().ends_with("</query>"));
    }

    #[test]
    fn test_wrap_query_leaves_other_tags_alone() {
        let wrapped = wrap_query("for $i in js:map return $i");
        assert!(wrapped.contains("for $i in js:map return $i"));
    }
}
