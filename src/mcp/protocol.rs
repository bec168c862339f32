//! JSON-RPC 2.0 message types and parsing.
//!
//! Everything on the wire is one of three shapes:
//!
//! - **Request**: has `id` and `method`, expects exactly one reply
//! - **Notification**: has `method` but no `id`, never answered
//! - **Response**: has `id` and exactly one of `result`/`error` (a client
//!   replying to a server-initiated message; the router ignores these)
//!
//! A payload is either a single message or an ordered batch (JSON array).
//! The reply to a batch preserves 1:1 correspondence for its request
//! members; a batch containing no requests produces no reply body at all,
//! which the transports signal distinctly from an empty result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

/// Protocol versions this server understands, preferred first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", "2024-11-05"];

/// Version offered when the client requests one we do not support.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name for capability negotiation.
pub const SERVER_NAME: &str = "storefront-mcp";

/// A JSON-RPC 2.0 request ID: a string or an integer, never `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric request ID.
    Number(i64),
    /// String request ID.
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,
    /// Unique request identifier.
    pub id: RequestId,
    /// The method to invoke.
    pub method: String,
    /// Optional parameters for the method.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 notification message.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcNotification {
    /// Must be "2.0".
    pub jsonrpc: String,
    /// The notification method.
    pub method: String,
    /// Optional parameters for the notification.
    #[serde(default)]
    pub params: Option<Value>,
}

/// A successful JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// The request ID this response corresponds to.
    pub id: RequestId,
    /// The result of the method call.
    pub result: Value,
}

impl JsonRpcResponse {
    /// Creates a success response.
    #[must_use]
    pub const fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcErrorData {
    /// The numeric error code.
    pub code: i32,
    /// A short description of the error.
    pub message: String,
    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    /// Always "2.0".
    pub jsonrpc: &'static str,
    /// The request ID this error corresponds to (if known).
    pub id: Option<RequestId>,
    /// The error details.
    pub error: JsonRpcErrorData,
}

impl JsonRpcError {
    /// Builds an error envelope from a taxonomy error.
    #[must_use]
    pub fn from_mcp(id: Option<RequestId>, error: &McpError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: JsonRpcErrorData {
                code: error.code(),
                message: error.to_string(),
                data: None,
            },
        }
    }

    /// Parse error response (ID cannot be determined).
    #[must_use]
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::from_mcp(None, &McpError::Parse(detail.into()))
    }

    /// Invalid-request error response.
    #[must_use]
    pub fn invalid_request(id: Option<RequestId>, detail: impl Into<String>) -> Self {
        Self::from_mcp(id, &McpError::InvalidRequest(detail.into()))
    }
}

/// A classified incoming message.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A notification; processed, never answered.
    Notification(JsonRpcNotification),
    /// A response from the peer; ignored by the router.
    Response,
}

impl IncomingMessage {
    /// Whether this message expects a reply.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

/// A parsed payload: one message or an ordered batch.
///
/// Batch members that fail validation are kept in place as ready-made error
/// envelopes so reply ordering is preserved.
#[derive(Debug)]
pub enum IncomingPayload {
    /// A single message.
    Single(Box<IncomingMessage>),
    /// An ordered batch.
    Batch(Vec<Result<IncomingMessage, JsonRpcError>>),
}

/// Parses a raw payload string into messages.
///
/// # Errors
///
/// Returns a ready-made error envelope when the payload is not JSON, or is
/// an empty batch (invalid per JSON-RPC 2.0).
pub fn parse_payload(raw: &str) -> Result<IncomingPayload, JsonRpcError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| JsonRpcError::parse_error(format!("invalid JSON: {e}")))?;

    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(JsonRpcError::invalid_request(None, "empty batch"));
            }
            Ok(IncomingPayload::Batch(
                items.into_iter().map(classify).collect(),
            ))
        }
        other => Ok(IncomingPayload::Single(Box::new(classify(other)?))),
    }
}

/// Classifies one JSON value as request, notification, or response.
///
/// # Errors
///
/// Returns an error envelope when the value violates the §3 invariants
/// (non-object, wrong `jsonrpc` literal, missing `method`, null `id`).
pub fn classify(value: Value) -> Result<IncomingMessage, JsonRpcError> {
    let Some(obj) = value.as_object() else {
        return Err(JsonRpcError::invalid_request(
            None,
            "message must be a JSON object",
        ));
    };

    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcError::invalid_request(
            None,
            "jsonrpc field must be \"2.0\"",
        ));
    }

    // A peer response carries result/error instead of method.
    if obj.contains_key("result") || obj.contains_key("error") {
        return Ok(IncomingMessage::Response);
    }

    let id = match obj.get("id") {
        None => None,
        Some(Value::Null) => {
            return Err(JsonRpcError::invalid_request(None, "id must not be null"));
        }
        Some(_) => Some(()),
    };

    match obj.get("method").and_then(Value::as_str) {
        None | Some("") => {
            let known_id = obj.get("id").and_then(|v| {
                serde_json::from_value::<RequestId>(v.clone()).ok()
            });
            Err(JsonRpcError::invalid_request(
                known_id,
                "missing method field",
            ))
        }
        Some(_) if id.is_some() => {
            let request: JsonRpcRequest = serde_json::from_value(value.clone())
                .map_err(|e| JsonRpcError::invalid_request(None, e.to_string()))?;
            Ok(IncomingMessage::Request(request))
        }
        Some(_) => {
            let notification: JsonRpcNotification = serde_json::from_value(value.clone())
                .map_err(|e| JsonRpcError::invalid_request(None, e.to_string()))?;
            Ok(IncomingMessage::Notification(notification))
        }
    }
}
