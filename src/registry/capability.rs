//! Capability model: the things the registry holds.
//!
//! A capability is a named tool, resource, or prompt together with the means
//! of invoking it. Invocation is a tagged union: either a direct handler
//! object bound at registration time, or a REST alias naming a method and
//! route on the external backend.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Valid capability names: 1-64 characters of `[A-Za-z0-9_-]`.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z0-9_-]{1,64}$").expect("name pattern is valid"));

/// The three capability families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// An invokable action with a declared input schema.
    Tool,
    /// A readable, URI-addressed data item.
    Resource,
    /// A named, parameterised message template.
    Prompt,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        };
        f.write_str(s)
    }
}

/// Optional capability metadata sent to clients.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotations {
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Hint that the capability does not mutate backend state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,

    /// Hint that the capability performs a destructive update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,

    /// Hint that repeated calls with the same arguments are safe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
}

impl Annotations {
    /// Annotations for a read-only capability.
    #[must_use]
    pub fn read_only(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            read_only_hint: Some(true),
            destructive_hint: None,
            idempotent_hint: None,
        }
    }

    /// Annotations for a destructive capability.
    #[must_use]
    pub fn destructive(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            read_only_hint: Some(false),
            destructive_hint: Some(true),
            idempotent_hint: None,
        }
    }
}

/// One message of a prompt template.
///
/// `content` may contain `{argument}` placeholders, substituted when the
/// prompt is rendered.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    /// Message role ("user", "assistant", "system").
    pub role: String,
    /// Template text with `{argument}` placeholders.
    pub content: String,
}

impl PromptMessage {
    /// Creates a user-role template message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A direct capability handler, bound at registration time.
#[async_trait::async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Executes the capability with the (already cleaned) call arguments.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message on failure; the registry maps it to
    /// a JSON-RPC application error.
    async fn call(&self, args: &Map<String, Value>) -> Result<Value, String>;
}

/// Handler adapter wrapping a synchronous closure.
pub struct ClosureHandler<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync,
{
    f: F,
}

impl<F> ClosureHandler<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync,
{
    /// Wraps a closure as a handler.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait::async_trait]
impl<F> CapabilityHandler for ClosureHandler<F>
where
    F: Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync,
{
    async fn call(&self, args: &Map<String, Value>) -> Result<Value, String> {
        (self.f)(args)
    }
}

/// How a capability runs when invoked.
#[derive(Clone)]
pub enum Invocation {
    /// A direct handler object.
    Callback(Arc<dyn CapabilityHandler>),
    /// Forward to `METHOD route` on the external REST backend, with
    /// `{param}`-style path substitution from the call arguments.
    RestAlias {
        /// HTTP method ("GET", "POST", "PUT", "DELETE").
        method: String,
        /// Route pattern relative to the backend base URL.
        route: String,
    },
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::RestAlias { method, route } => {
                write!(f, "RestAlias({method} {route})")
            }
        }
    }
}

/// Predicate evaluated with the call arguments before a capability runs.
/// Absence means public access.
pub type PermissionCheck = Arc<dyn Fn(&Map<String, Value>) -> bool + Send + Sync>;

/// A registered tool, resource, or prompt.
#[derive(Clone)]
pub struct Capability {
    /// Unique name within the capability's kind.
    pub name: String,
    /// Human-readable description, sent to clients as documentation.
    pub description: String,
    /// Capability family.
    pub kind: CapabilityKind,
    /// JSON-Schema-like object describing accepted parameters.
    pub input_schema: Value,
    /// Optional metadata hints.
    pub annotations: Option<Annotations>,
    /// Resource URI (resources only).
    pub uri: Option<String>,
    /// Prompt message template (prompts only).
    pub messages: Vec<PromptMessage>,
    /// How the capability runs.
    pub invocation: Invocation,
    /// Optional access predicate.
    pub permission_check: Option<PermissionCheck>,
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("invocation", &self.invocation)
            .finish_non_exhaustive()
    }
}

impl Capability {
    /// Starts building a tool capability.
    #[must_use]
    pub fn tool(name: impl Into<String>) -> CapabilityBuilder {
        CapabilityBuilder::new(CapabilityKind::Tool, name)
    }

    /// Starts building a resource capability addressed by `uri`.
    #[must_use]
    pub fn resource(name: impl Into<String>, uri: impl Into<String>) -> CapabilityBuilder {
        let mut builder = CapabilityBuilder::new(CapabilityKind::Resource, name);
        builder.uri = Some(uri.into());
        builder
    }

    /// Starts building a prompt capability.
    #[must_use]
    pub fn prompt(name: impl Into<String>) -> CapabilityBuilder {
        CapabilityBuilder::new(CapabilityKind::Prompt, name)
    }

    /// Whether the capability is annotated as read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.annotations
            .as_ref()
            .and_then(|a| a.read_only_hint)
            .unwrap_or(false)
    }
}

/// Builder for [`Capability`].
pub struct CapabilityBuilder {
    kind: CapabilityKind,
    name: String,
    description: String,
    input_schema: Value,
    annotations: Option<Annotations>,
    uri: Option<String>,
    messages: Vec<PromptMessage>,
    invocation: Option<Invocation>,
    permission_check: Option<PermissionCheck>,
}

impl CapabilityBuilder {
    fn new(kind: CapabilityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            annotations: None,
            uri: None,
            messages: Vec::new(),
            invocation: None,
            permission_check: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the input schema.
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Sets the annotations.
    #[must_use]
    pub fn annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    /// Sets the prompt message template.
    #[must_use]
    pub fn messages(mut self, messages: Vec<PromptMessage>) -> Self {
        self.messages = messages;
        self
    }

    /// Sets the access predicate.
    #[must_use]
    pub fn permission_check(
        mut self,
        check: impl Fn(&Map<String, Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.permission_check = Some(Arc::new(check));
        self
    }

    /// Binds a direct handler and finishes the build.
    #[must_use]
    pub fn callback(mut self, handler: impl CapabilityHandler + 'static) -> Capability {
        self.invocation = Some(Invocation::Callback(Arc::new(handler)));
        self.finish()
    }

    /// Binds a synchronous closure handler and finishes the build.
    #[must_use]
    pub fn callback_fn(
        self,
        f: impl Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Capability {
        self.callback(ClosureHandler::new(f))
    }

    /// Binds a REST alias and finishes the build.
    #[must_use]
    pub fn rest_alias(mut self, method: impl Into<String>, route: impl Into<String>) -> Capability {
        self.invocation = Some(Invocation::RestAlias {
            method: method.into(),
            route: route.into(),
        });
        self.finish()
    }

    fn finish(self) -> Capability {
        Capability {
            name: self.name,
            description: self.description,
            kind: self.kind,
            input_schema: self.input_schema,
            annotations: self.annotations,
            uri: self.uri,
            messages: self.messages,
            invocation: self.invocation.unwrap_or_else(|| {
                Invocation::Callback(Arc::new(ClosureHandler::new(|_| Ok(Value::Null))))
            }),
            permission_check: self.permission_check,
        }
    }
}

/// Checks a capability name against the `^[A-Za-z0-9_-]{1,64}$` pattern.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Validates the shape of an input schema.
///
/// The schema must be an object with `"type": "object"`, a `properties`
/// object whose members each declare a type, and any `required` list must
/// only reference declared properties.
///
/// # Errors
///
/// Returns a description of the first violation found.
pub fn validate_input_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "input schema must be a JSON object".to_string())?;

    match obj.get("type").and_then(Value::as_str) {
        Some("object") => {}
        Some(other) => return Err(format!("input schema type must be 'object', got '{other}'")),
        None => return Err("input schema must declare \"type\": \"object\"".to_string()),
    }

    let no_properties = Map::new();
    let properties = match obj.get("properties") {
        None => &no_properties,
        Some(props) => props
            .as_object()
            .ok_or_else(|| "input schema 'properties' must be an object".to_string())?,
    };

    for (prop_name, prop) in properties {
        let declared = prop
            .as_object()
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str);
        match declared {
            Some("string" | "number" | "integer" | "boolean" | "array" | "object") => {}
            Some(other) => {
                return Err(format!(
                    "property '{prop_name}' has unsupported type '{other}'"
                ));
            }
            None => {
                return Err(format!("property '{prop_name}' must declare a type"));
            }
        }
    }

    if let Some(required) = obj.get("required") {
        let entries = required
            .as_array()
            .ok_or_else(|| "input schema 'required' must be an array".to_string())?;
        for entry in entries {
            let key = entry
                .as_str()
                .ok_or_else(|| "entries of 'required' must be strings".to_string())?;
            if !properties.contains_key(key) {
                return Err(format!(
                    "required property '{key}' is not declared in 'properties'"
                ));
            }
        }
    }

    Ok(())
}
