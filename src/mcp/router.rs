//! Request router / protocol engine.
//!
//! Stateless per call (the only mutable state is the logging level and the
//! resource subscription set). The router validates JSON-RPC shape, resolves
//! the method family, delegates to the capability registry, and wraps every
//! outcome — result or taxonomy error — into a full JSON-RPC envelope with
//! the original request ID. Nothing throws past this layer.
//!
//! Authentication happens in the transports before dispatch; the router
//! receives the resolved [`Principal`] and only enforces the read-only
//! restriction on the anonymous principal.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::auth::Principal;
use crate::backend::RestBackend;
use crate::error::McpError;
use crate::mcp::protocol::{
    parse_payload, IncomingMessage, IncomingPayload, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION, SERVER_NAME,
    SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::registry::{Capability, CapabilityKind, CapabilityRegistry};

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// tools/list and tools/call.
    pub tools: ToolsCapability,
    /// resources/list, read, subscribe, unsubscribe.
    pub resources: ResourcesCapability,
    /// prompts/list and prompts/get.
    pub prompts: PromptsCapability,
    /// logging/setLevel.
    pub logging: EmptyCapability,
    /// completion/complete.
    pub completions: EmptyCapability,
}

/// Tool-family capability flags.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// Whether the tool list can change during the session.
    pub list_changed: bool,
}

/// Resource-family capability flags.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    /// Whether resources/subscribe is accepted.
    pub subscribe: bool,
    /// Whether the resource list can change during the session.
    pub list_changed: bool,
}

/// Prompt-family capability flags.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    /// Whether the prompt list can change during the session.
    pub list_changed: bool,
}

/// A capability family with no flags; serialises as `{}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmptyCapability {}

/// Server information for the initialisation response.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    protocol_version: Option<String>,
    #[serde(default)]
    client_info: Option<ClientInfo>,
}

/// Client information received during initialisation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientInfo {
    name: String,
    #[serde(default)]
    version: Option<String>,
}

/// Parameters for tools/call.
#[derive(Debug, Clone, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Content item in a tools/call response.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
    /// Base64-encoded image content.
    Image {
        /// Base64 payload.
        data: String,
        /// Image MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

/// The request router.
pub struct Router {
    registry: Arc<CapabilityRegistry>,
    backend: Arc<RestBackend>,
    log_level: RwLock<String>,
    subscriptions: RwLock<HashSet<String>>,
}

impl Router {
    /// Creates a router over an already-frozen registry.
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>, backend: Arc<RestBackend>) -> Self {
        Self {
            registry,
            backend,
            log_level: RwLock::new("info".to_string()),
            subscriptions: RwLock::new(HashSet::new()),
        }
    }

    /// Handles a raw payload string and returns the reply body, if any.
    ///
    /// `None` means "accepted, no content" — the payload contained no
    /// request messages. Transports map this to their own no-body signal
    /// (HTTP 202, no STDIO output line).
    pub async fn handle_payload(&self, raw: &str, principal: &Principal) -> Option<Value> {
        let payload = match parse_payload(raw) {
            Ok(p) => p,
            Err(e) => return Some(to_value(&e)),
        };

        match payload {
            IncomingPayload::Single(msg) => self.handle_message(*msg, principal).await,
            IncomingPayload::Batch(items) => {
                let mut replies = Vec::new();
                for item in items {
                    match item {
                        Ok(IncomingMessage::Request(req)) => {
                            replies.push(self.handle_request(req, principal).await);
                        }
                        Ok(IncomingMessage::Notification(notif)) => {
                            self.handle_notification(&notif);
                        }
                        Ok(IncomingMessage::Response) => {}
                        Err(error) => replies.push(to_value(&error)),
                    }
                }

                match replies.len() {
                    0 => None,
                    1 => replies.pop(),
                    _ => Some(Value::Array(replies)),
                }
            }
        }
    }

    /// Handles one classified message.
    pub async fn handle_message(
        &self,
        msg: IncomingMessage,
        principal: &Principal,
    ) -> Option<Value> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req, principal).await),
            IncomingMessage::Notification(ref notif) => {
                self.handle_notification(notif);
                None
            }
            IncomingMessage::Response => None,
        }
    }

    /// Dispatches a request and wraps the outcome into a full envelope.
    async fn handle_request(&self, req: JsonRpcRequest, principal: &Principal) -> Value {
        debug!(method = %req.method, id = %req.id, principal = %principal, "Dispatching request");

        let id = req.id.clone();
        let outcome = self.dispatch(&req, principal).await;

        match outcome {
            Ok(result) => to_value(&JsonRpcResponse::success(id, result)),
            Err(error) => {
                debug!(method = %req.method, code = error.code(), "Request failed: {error}");
                to_value(&JsonRpcError::from_mcp(Some(id), &error))
            }
        }
    }

    /// Routes by method name.
    async fn dispatch(
        &self,
        req: &JsonRpcRequest,
        principal: &Principal,
    ) -> Result<Value, McpError> {
        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.params.as_ref()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(req.params.as_ref(), principal).await,
            "resources/list" => Ok(self.handle_resources_list()),
            "resources/read" => self.handle_resources_read(req.params.as_ref()).await,
            "resources/subscribe" => self.handle_resources_subscribe(req.params.as_ref(), true),
            "resources/unsubscribe" => {
                self.handle_resources_subscribe(req.params.as_ref(), false)
            }
            "prompts/list" => Ok(self.handle_prompts_list()),
            "prompts/get" => self.handle_prompts_get(req.params.as_ref()),
            "logging/setLevel" => self.handle_set_level(req.params.as_ref()),
            "completion/complete" => Ok(json!({
                "completion": {"values": [], "total": 0, "hasMore": false}
            })),
            "roots/list" => Ok(json!({"roots": []})),
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    /// Handles incoming notifications. Nothing here produces output.
    fn handle_notification(&self, notif: &JsonRpcNotification) {
        match notif.method.as_str() {
            "notifications/initialized" => debug!("Client reported initialised"),
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    fn handle_initialize(&self, params: Option<&Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p.clone())
                .map_err(|e| McpError::InvalidParams(format!("invalid initialize params: {e}")))?,
            None => InitializeParams::default(),
        };

        let requested = params.protocol_version.as_deref();
        let negotiated = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v,
            _ => DEFAULT_PROTOCOL_VERSION,
        };

        if let Some(client) = &params.client_info {
            debug!(
                client = %client.name,
                version = client.version.as_deref().unwrap_or("unknown"),
                negotiated,
                "Initialise"
            );
        }

        Ok(json!({
            "protocolVersion": negotiated,
            "capabilities": ServerCapabilities {
                tools: ToolsCapability::default(),
                resources: ResourcesCapability { subscribe: true, list_changed: false },
                prompts: PromptsCapability::default(),
                logging: EmptyCapability {},
                completions: EmptyCapability {},
            },
            "serverInfo": ServerInfo::default(),
        }))
    }

    fn handle_tools_list(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .list(CapabilityKind::Tool)
            .into_iter()
            .map(|tool| {
                let mut def = json!({
                    "name": tool.name,
                    "description": tool.description,
                    "inputSchema": tool.input_schema,
                });
                if let Some(annotations) = &tool.annotations {
                    def["annotations"] =
                        serde_json::to_value(annotations).unwrap_or(Value::Null);
                }
                def
            })
            .collect();

        json!({"tools": tools})
    }

    async fn handle_tools_call(
        &self,
        params: Option<&Value>,
        principal: &Principal,
    ) -> Result<Value, McpError> {
        let params: ToolCallParams = parse_params(params, "tools/call")?;
        let args = clean_arguments(params.arguments)?;

        let tool = self.registry.get(CapabilityKind::Tool, &params.name)?;

        if principal.is_read_only() && !tool.is_read_only() {
            return Err(McpError::PermissionDenied {
                capability: tool.name.clone(),
            });
        }

        check_required(&tool.input_schema, &args)?;

        let result = self.registry.invoke(&params.name, &args, &self.backend).await?;

        let content = wrap_content(&result)?;
        Ok(json!({"content": content, "isError": false}))
    }

    fn handle_resources_list(&self) -> Value {
        let resources: Vec<Value> = self
            .registry
            .list(CapabilityKind::Resource)
            .into_iter()
            .map(|res| {
                json!({
                    "uri": res.uri,
                    "name": res.name,
                    "description": res.description,
                    "mimeType": "application/json",
                })
            })
            .collect();

        json!({"resources": resources})
    }

    async fn handle_resources_read(&self, params: Option<&Value>) -> Result<Value, McpError> {
        let uri = require_string_param(params, "uri")?;
        let result = self.registry.read_resource(&uri, &self.backend).await?;

        let (mime, text) = match result {
            Value::String(s) => ("text/plain", s),
            other => (
                "application/json",
                serde_json::to_string(&other)
                    .map_err(|e| McpError::Internal(format!("failed to encode resource: {e}")))?,
            ),
        };

        Ok(json!({
            "contents": [{"uri": uri, "mimeType": mime, "text": text}]
        }))
    }

    fn handle_resources_subscribe(
        &self,
        params: Option<&Value>,
        subscribe: bool,
    ) -> Result<Value, McpError> {
        let uri = require_string_param(params, "uri")?;
        // Subscribing to an unknown resource is an error; unsubscribe is lax.
        if subscribe {
            self.registry.get_resource_by_uri(&uri)?;
        }

        let mut subs = self.subscriptions.write().expect("subscription set poisoned");
        if subscribe {
            subs.insert(uri);
        } else {
            subs.remove(&uri);
        }
        drop(subs);

        Ok(json!({}))
    }

    fn handle_prompts_list(&self) -> Value {
        let prompts: Vec<Value> = self
            .registry
            .list(CapabilityKind::Prompt)
            .into_iter()
            .map(|prompt| {
                json!({
                    "name": prompt.name,
                    "description": prompt.description,
                    "arguments": prompt_arguments(prompt),
                })
            })
            .collect();

        json!({"prompts": prompts})
    }

    fn handle_prompts_get(&self, params: Option<&Value>) -> Result<Value, McpError> {
        let name = require_string_param(params, "name")?;
        let prompt = self.registry.get(CapabilityKind::Prompt, &name)?;

        let args: Map<String, Value> = params
            .and_then(|p| p.get("arguments"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let messages: Vec<Value> = prompt
            .messages
            .iter()
            .map(|msg| {
                let mut text = msg.content.clone();
                for (key, value) in &args {
                    let needle = format!("{{{key}}}");
                    let replacement = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    text = text.replace(&needle, &replacement);
                }
                json!({
                    "role": msg.role,
                    "content": {"type": "text", "text": text},
                })
            })
            .collect();

        Ok(json!({
            "description": prompt.description,
            "messages": messages,
        }))
    }

    fn handle_set_level(&self, params: Option<&Value>) -> Result<Value, McpError> {
        let level = require_string_param(params, "level")?;
        let valid = ["debug", "info", "notice", "warning", "error", "critical"];
        if !valid.contains(&level.as_str()) {
            return Err(McpError::InvalidParams(format!(
                "unknown logging level '{level}'"
            )));
        }

        let mut current = self.log_level.write().expect("log level poisoned");
        *current = level.clone();
        drop(current);

        debug!(level = %level, "Client adjusted logging level");
        Ok(json!({}))
    }

    /// The client-requested logging level.
    #[must_use]
    pub fn log_level(&self) -> String {
        self.log_level.read().expect("log level poisoned").clone()
    }

    /// Whether a resource URI currently has a subscription.
    #[must_use]
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions
            .read()
            .expect("subscription set poisoned")
            .contains(uri)
    }
}

/// Deserialises required method params, mapping absence and shape errors
/// to InvalidParams.
fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<&Value>,
    method: &str,
) -> Result<T, McpError> {
    let params = params
        .ok_or_else(|| McpError::InvalidParams(format!("{method} requires params")))?;
    serde_json::from_value(params.clone())
        .map_err(|e| McpError::InvalidParams(format!("invalid {method} params: {e}")))
}

/// Extracts a required string member from params.
fn require_string_param(params: Option<&Value>, key: &str) -> Result<String, McpError> {
    params
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| McpError::InvalidParams(format!("missing required parameter '{key}'")))
}

/// Normalises call arguments: must be an object (or absent), and null or
/// empty-string values are stripped before invocation.
fn clean_arguments(arguments: Option<Value>) -> Result<Map<String, Value>, McpError> {
    let mut args = match arguments {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(McpError::InvalidParams(
                "arguments must be an object".to_string(),
            ));
        }
    };

    args.retain(|_, v| !v.is_null() && v.as_str() != Some(""));
    Ok(args)
}

/// Verifies that every schema-required key survives argument cleaning.
fn check_required(schema: &Value, args: &Map<String, Value>) -> Result<(), McpError> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };

    for entry in required {
        if let Some(key) = entry.as_str() {
            if !args.contains_key(key) {
                return Err(McpError::InvalidParams(format!(
                    "missing required argument '{key}'"
                )));
            }
        }
    }
    Ok(())
}

/// Wraps a tool result as MCP content: one image element when the result
/// signals an image payload, otherwise one text element holding the JSON of
/// the result.
fn wrap_content(result: &Value) -> Result<Vec<ToolContent>, McpError> {
    if let Some(obj) = result.as_object() {
        if obj.get("type").and_then(Value::as_str) == Some("image") {
            if let Some(data) = obj.get("data").and_then(Value::as_str) {
                let mime_type = obj
                    .get("mimeType")
                    .and_then(Value::as_str)
                    .unwrap_or("image/png");
                return Ok(vec![ToolContent::Image {
                    data: data.to_string(),
                    mime_type: mime_type.to_string(),
                }]);
            }
            warn!("Image-typed tool result without data; falling back to text");
        }
    }

    let text = serde_json::to_string(result)
        .map_err(|e| McpError::Internal(format!("failed to encode tool result: {e}")))?;
    Ok(vec![ToolContent::Text { text }])
}

/// Derives the prompts/list argument descriptors from an input schema.
fn prompt_arguments(prompt: &Capability) -> Vec<Value> {
    let required: Vec<&str> = prompt
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    prompt
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| {
                    json!({
                        "name": name,
                        "description": prop.get("description").cloned().unwrap_or(Value::Null),
                        "required": required.contains(&name.as_str()),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Annotations, Capability, PromptMessage};

    fn test_router() -> Router {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                Capability::tool("echo")
                    .description("Echo the input")
                    .input_schema(json!({
                        "type": "object",
                        "properties": {"msg": {"type": "string"}},
                        "required": ["msg"]
                    }))
                    .annotations(Annotations::read_only("Echo"))
                    .callback_fn(|args| Ok(json!({"echo": args.get("msg")}))),
            )
            .unwrap();
        registry
            .register(
                Capability::tool("screenshot")
                    .description("Returns an image payload")
                    .annotations(Annotations::read_only("Screenshot"))
                    .callback_fn(|_| {
                        Ok(json!({"type": "image", "data": "aGVsbG8=", "mimeType": "image/jpeg"}))
                    }),
            )
            .unwrap();
        registry
            .register(
                Capability::resource("catalog", "store://catalog")
                    .description("Catalog summary")
                    .callback_fn(|_| Ok(json!({"products": 3}))),
            )
            .unwrap();
        registry
            .register(
                Capability::prompt("describe_product")
                    .description("Draft a product description")
                    .input_schema(json!({
                        "type": "object",
                        "properties": {"name": {"type": "string"}},
                        "required": ["name"]
                    }))
                    .messages(vec![PromptMessage::user(
                        "Write a description for {name}.",
                    )])
                    .callback_fn(|_| Ok(Value::Null)),
            )
            .unwrap();

        let backend = RestBackend::new("http://backend.invalid", 1).unwrap();
        Router::new(Arc::new(registry), Arc::new(backend))
    }

    async fn dispatch_raw(router: &Router, raw: &str) -> Option<Value> {
        router.handle_payload(raw, &Principal::Local).await
    }

    #[tokio::test]
    async fn initialize_negotiates_supported_version() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05"}}"#,
        )
        .await
        .unwrap();

        assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(reply["result"]["serverInfo"]["name"], "storefront-mcp");
    }

    #[tokio::test]
    async fn initialize_falls_back_on_unknown_version() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#,
        )
        .await
        .unwrap();

        assert_eq!(
            reply["result"]["protocolVersion"],
            DEFAULT_PROTOCOL_VERSION
        );
    }

    #[tokio::test]
    async fn unknown_method_echoes_name() {
        let router = test_router();
        let reply = dispatch_raw(&router, r#"{"jsonrpc":"2.0","id":1,"method":"bogus"}"#)
            .await
            .unwrap();

        assert_eq!(reply["error"]["code"], -32601);
        assert!(reply["error"]["message"].as_str().unwrap().contains("bogus"));
        assert_eq!(reply["id"], 1);
    }

    #[tokio::test]
    async fn tools_list_includes_schema() {
        let router = test_router();
        let reply = dispatch_raw(&router, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();

        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "echo");
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
        assert_eq!(tools[0]["annotations"]["readOnlyHint"], true);
    }

    #[tokio::test]
    async fn tools_call_wraps_text_content() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"msg":"hi"}}}"#,
        )
        .await
        .unwrap();

        let content = reply["result"]["content"].as_array().unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], r#"{"echo":"hi"}"#);
    }

    #[tokio::test]
    async fn tools_call_wraps_image_content() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"screenshot"}}"#,
        )
        .await
        .unwrap();

        let content = reply["result"]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["data"], "aGVsbG8=");
        assert_eq!(content[0]["mimeType"], "image/jpeg");
    }

    #[tokio::test]
    async fn tools_call_strips_empty_arguments() {
        let router = test_router();
        // msg is required; after stripping the empty string it is missing.
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"echo","arguments":{"msg":""}}}"#,
        )
        .await
        .unwrap();

        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn tools_call_requires_name() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{}}"#,
        )
        .await
        .unwrap();

        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn anonymous_principal_is_read_only() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                Capability::tool("create_cart_item")
                    .annotations(Annotations::destructive("Add to cart"))
                    .callback_fn(|_| Ok(json!({"ok": true}))),
            )
            .unwrap();
        let backend = RestBackend::new("http://backend.invalid", 1).unwrap();
        let router = Router::new(Arc::new(registry), Arc::new(backend));

        let reply = router
            .handle_payload(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"create_cart_item"}}"#,
                &Principal::Anonymous,
            )
            .await
            .unwrap();

        assert_eq!(reply["error"]["code"], -32000);
        assert!(reply["error"]["message"]
            .as_str()
            .unwrap()
            .contains("create_cart_item"));
    }

    #[tokio::test]
    async fn resources_read_round_trip() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":7,"method":"resources/read","params":{"uri":"store://catalog"}}"#,
        )
        .await
        .unwrap();

        let contents = reply["result"]["contents"].as_array().unwrap();
        assert_eq!(contents[0]["uri"], "store://catalog");
        assert_eq!(contents[0]["mimeType"], "application/json");
        assert_eq!(contents[0]["text"], r#"{"products":3}"#);
    }

    #[tokio::test]
    async fn resources_read_unknown_uri() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":8,"method":"resources/read","params":{"uri":"store://ghost"}}"#,
        )
        .await
        .unwrap();

        assert_eq!(reply["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn subscribe_then_unsubscribe() {
        let router = test_router();
        dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":9,"method":"resources/subscribe","params":{"uri":"store://catalog"}}"#,
        )
        .await
        .unwrap();
        assert!(router.is_subscribed("store://catalog"));

        dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":10,"method":"resources/unsubscribe","params":{"uri":"store://catalog"}}"#,
        )
        .await
        .unwrap();
        assert!(!router.is_subscribed("store://catalog"));
    }

    #[tokio::test]
    async fn prompts_get_renders_arguments() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":11,"method":"prompts/get","params":{"name":"describe_product","arguments":{"name":"Red Mug"}}}"#,
        )
        .await
        .unwrap();

        let messages = reply["result"]["messages"].as_array().unwrap();
        assert_eq!(
            messages[0]["content"]["text"],
            "Write a description for Red Mug."
        );
    }

    #[tokio::test]
    async fn prompts_list_reports_arguments() {
        let router = test_router();
        let reply = dispatch_raw(&router, r#"{"jsonrpc":"2.0","id":12,"method":"prompts/list"}"#)
            .await
            .unwrap();

        let prompts = reply["result"]["prompts"].as_array().unwrap();
        assert_eq!(prompts[0]["name"], "describe_product");
        assert_eq!(prompts[0]["arguments"][0]["name"], "name");
        assert_eq!(prompts[0]["arguments"][0]["required"], true);
    }

    #[tokio::test]
    async fn set_level_validates_and_stores() {
        let router = test_router();
        dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":13,"method":"logging/setLevel","params":{"level":"debug"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(router.log_level(), "debug");

        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":14,"method":"logging/setLevel","params":{"level":"loud"}}"#,
        )
        .await
        .unwrap();
        assert_eq!(reply["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn notification_only_batch_yields_no_body() {
        let router = test_router();
        let raw = r#"[
            {"jsonrpc":"2.0","method":"notifications/initialized"},
            {"jsonrpc":"2.0","method":"notifications/progress"},
            {"jsonrpc":"2.0","method":"notifications/cancelled"}
        ]"#;
        assert!(dispatch_raw(&router, raw).await.is_none());
    }

    #[tokio::test]
    async fn mixed_batch_preserves_order_and_ids() {
        let router = test_router();
        let raw = r#"[
            {"jsonrpc":"2.0","id":101,"method":"ping"},
            {"jsonrpc":"2.0","method":"notifications/initialized"},
            {"jsonrpc":"2.0","id":102,"method":"tools/list"}
        ]"#;
        let reply = dispatch_raw(&router, raw).await.unwrap();

        let replies = reply.as_array().unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], 101);
        assert_eq!(replies[1]["id"], 102);
    }

    #[tokio::test]
    async fn single_request_batch_yields_single_object() {
        let router = test_router();
        let raw = r#"[{"jsonrpc":"2.0","id":1,"method":"ping"}]"#;
        let reply = dispatch_raw(&router, raw).await.unwrap();
        assert!(reply.is_object());
        assert_eq!(reply["id"], 1);
    }

    #[tokio::test]
    async fn completion_and_roots_answer_empty() {
        let router = test_router();
        let reply = dispatch_raw(
            &router,
            r#"{"jsonrpc":"2.0","id":15,"method":"completion/complete","params":{}}"#,
        )
        .await
        .unwrap();
        assert_eq!(reply["result"]["completion"]["values"], json!([]));

        let reply = dispatch_raw(&router, r#"{"jsonrpc":"2.0","id":16,"method":"roots/list"}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"]["roots"], json!([]));
    }

    #[tokio::test]
    async fn ping_answers_empty_object() {
        let router = test_router();
        let reply = dispatch_raw(&router, r#"{"jsonrpc":"2.0","id":17,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"], json!({}));
    }
}
