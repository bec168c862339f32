//! REST backend client.
//!
//! Tools registered as REST aliases forward their invocation to the store's
//! REST API. The backend is an opaque collaborator: its only contract is
//! "returns JSON or an error status".
//!
//! Route patterns may contain `{param}` placeholders; each is substituted
//! with the stringified value of the matching call argument (arrays and
//! objects are JSON-encoded). Arguments not consumed by the path travel as
//! query parameters for GET/DELETE and as the JSON body otherwise.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::McpError;

/// Client for the external REST backend.
#[derive(Debug, Clone)]
pub struct RestBackend {
    base_url: String,
    client: Client,
}

impl RestBackend {
    /// Creates a backend client with a bounded request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, McpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| McpError::Internal(format!("failed to build HTTP client: {e}")))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { base_url, client })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues `method route` against the backend with path-parameter
    /// substitution and argument forwarding.
    ///
    /// # Errors
    ///
    /// - [`McpError::InvalidParams`] when a `{param}` placeholder has no
    ///   matching argument or the method is unsupported.
    /// - [`McpError::Backend`] when the backend answers with an error
    ///   status; the backend's own message is carried through.
    /// - [`McpError::Internal`] on timeout or connection failure.
    pub async fn call(
        &self,
        method: &str,
        route: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, McpError> {
        let method = parse_method(method)?;
        let (path, consumed) = substitute_path(route, args)?;

        let remaining: Vec<(&String, &Value)> = args
            .iter()
            .filter(|(name, _)| !consumed.iter().any(|c| c == *name))
            .collect();

        let url = format!("{}{path}", self.base_url);
        debug!(method = %method, url = %url, "Backend request");

        let mut request = self.client.request(method.clone(), &url);
        if matches!(method, Method::GET | Method::DELETE) {
            let query: Vec<(String, String)> = remaining
                .into_iter()
                .map(|(name, value)| (name.clone(), stringify(value)))
                .collect();
            request = request.query(&query);
        } else {
            let mut body = Map::new();
            for (name, value) in remaining {
                body.insert(name.clone(), value.clone());
            }
            request = request.json(&Value::Object(body));
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Backend request failed");
            if e.is_timeout() {
                McpError::Internal("backend request timed out".to_string())
            } else {
                McpError::Internal("backend is unreachable".to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| McpError::Internal(format!("failed to read backend response: {e}")))?;

        if !status.is_success() {
            return Err(McpError::Backend(extract_message(status, &text)));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

fn parse_method(method: &str) -> Result<Method, McpError> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        "PUT" => Ok(Method::PUT),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        other => Err(McpError::InvalidParams(format!(
            "unsupported backend method '{other}'"
        ))),
    }
}

/// Replaces `{param}` placeholders in `route`, returning the concrete path
/// and the set of consumed argument names.
fn substitute_path(
    route: &str,
    args: &Map<String, Value>,
) -> Result<(String, Vec<String>), McpError> {
    let mut path = String::new();
    let mut consumed = Vec::new();

    for segment in route.split('/') {
        if segment.is_empty() {
            continue;
        }
        path.push('/');

        if let Some(param) = segment
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
        {
            let value = args.get(param).ok_or_else(|| {
                McpError::InvalidParams(format!("missing path parameter '{param}'"))
            })?;
            path.push_str(&stringify(value));
            consumed.push(param.to_string());
        } else {
            path.push_str(segment);
        }
    }

    Ok((path, consumed))
}

/// Stringifies an argument value for path/query use. Arrays and objects are
/// JSON-encoded; strings are taken verbatim.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
        other => other.to_string(),
    }
}

/// Pulls a displayable message out of a backend error body.
fn extract_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map_or_else(
            || format!("backend returned status {status}"),
            ToString::to_string,
        )
}
