//! Capability Registry.
//!
//! Holds tool/resource/prompt definitions and their invocation bindings.
//! The registry is populated once during bootstrap, then moved behind an
//! `Arc` and never mutated: concurrent reads need no locking.
//!
//! Name uniqueness is enforced at registration; a duplicate is a fatal
//! configuration error, not a runtime error. An independent enabled/disabled
//! override (from configuration, keyed by name) is consulted at list and
//! call time — it is not part of the capability itself.

mod capability;

pub use capability::{
    is_valid_name, validate_input_schema, Annotations, Capability, CapabilityBuilder,
    CapabilityHandler, CapabilityKind, ClosureHandler, Invocation, PermissionCheck, PromptMessage,
};

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::backend::RestBackend;
use crate::error::{Entity, McpError};

/// Errors raised while populating the registry. All of these abort startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A capability of the same kind and name is already registered.
    #[error("duplicate {kind} registration: {name}")]
    DuplicateName {
        /// Capability family.
        kind: CapabilityKind,
        /// The conflicting name.
        name: String,
    },

    /// The capability name does not match `^[A-Za-z0-9_-]{1,64}$`.
    #[error("invalid capability name: {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// The capability's input schema failed shape validation.
    #[error("invalid input schema for '{name}': {message}")]
    InvalidSchema {
        /// The capability being registered.
        name: String,
        /// Description of the violation.
        message: String,
    },
}

/// The capability registry.
///
/// Built once at startup via [`CapabilityRegistry::register`], then shared
/// read-only.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    tools: IndexMap<String, Capability>,
    resources: IndexMap<String, Capability>,
    prompts: IndexMap<String, Capability>,
    /// External enabled/disabled override, keyed by name.
    overrides: HashMap<String, bool>,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry carrying enabled/disabled overrides.
    #[must_use]
    pub fn with_overrides(overrides: HashMap<String, bool>) -> Self {
        Self {
            overrides,
            ..Self::default()
        }
    }

    /// Registers a capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid, the input schema is
    /// malformed, or a capability of the same kind and name already exists.
    /// The registry is left unchanged on failure.
    pub fn register(&mut self, capability: Capability) -> Result<(), RegistryError> {
        if !is_valid_name(&capability.name) {
            return Err(RegistryError::InvalidName {
                name: capability.name,
            });
        }

        validate_input_schema(&capability.input_schema).map_err(|message| {
            RegistryError::InvalidSchema {
                name: capability.name.clone(),
                message,
            }
        })?;

        let table = self.table_mut(capability.kind);
        if table.contains_key(&capability.name) {
            return Err(RegistryError::DuplicateName {
                kind: capability.kind,
                name: capability.name,
            });
        }

        debug!(kind = %capability.kind, name = %capability.name, "Registered capability");
        table.insert(capability.name.clone(), capability);
        Ok(())
    }

    /// Lists capabilities of one kind in registration order, omitting those
    /// whose override is explicitly `false`.
    #[must_use]
    pub fn list(&self, kind: CapabilityKind) -> Vec<&Capability> {
        self.table(kind)
            .values()
            .filter(|c| self.is_enabled(&c.name))
            .collect()
    }

    /// Looks up a capability by kind and name.
    ///
    /// Disabled capabilities are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotFound`] if absent or disabled.
    pub fn get(&self, kind: CapabilityKind, name: &str) -> Result<&Capability, McpError> {
        self.table(kind)
            .get(name)
            .filter(|_| self.is_enabled(name))
            .ok_or_else(|| McpError::NotFound {
                kind: entity_for(kind),
                name: name.to_string(),
            })
    }

    /// Looks up a resource capability by its URI.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotFound`] if no enabled resource carries `uri`.
    pub fn get_resource_by_uri(&self, uri: &str) -> Result<&Capability, McpError> {
        self.resources
            .values()
            .find(|c| c.uri.as_deref() == Some(uri) && self.is_enabled(&c.name))
            .ok_or_else(|| McpError::NotFound {
                kind: Entity::Resource,
                name: uri.to_string(),
            })
    }

    /// Invokes a tool by name.
    ///
    /// Resolution failures map to method-not-found; a refusing permission
    /// predicate maps to a permission error naming the tool; handler and
    /// backend failures map to application errors. The underlying handler
    /// is never run when the permission predicate refuses.
    ///
    /// # Errors
    ///
    /// See [`McpError`] for the taxonomy.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Map<String, Value>,
        backend: &RestBackend,
    ) -> Result<Value, McpError> {
        let capability = self.get(CapabilityKind::Tool, name)?;
        Self::run(capability, args, backend).await
    }

    /// Reads a resource by URI, running its invocation binding.
    ///
    /// # Errors
    ///
    /// See [`McpError`] for the taxonomy.
    pub async fn read_resource(
        &self,
        uri: &str,
        backend: &RestBackend,
    ) -> Result<Value, McpError> {
        let capability = self.get_resource_by_uri(uri)?;
        Self::run(capability, &Map::new(), backend).await
    }

    /// Runs a capability's invocation after its permission predicate.
    async fn run(
        capability: &Capability,
        args: &Map<String, Value>,
        backend: &RestBackend,
    ) -> Result<Value, McpError> {
        if let Some(check) = &capability.permission_check {
            if !check(args) {
                return Err(McpError::PermissionDenied {
                    capability: capability.name.clone(),
                });
            }
        }

        match &capability.invocation {
            Invocation::Callback(handler) => {
                handler.call(args).await.map_err(McpError::Execution)
            }
            Invocation::RestAlias { method, route } => backend.call(method, route, args).await,
        }
    }

    /// Total number of registered capabilities, overrides ignored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len() + self.resources.len() + self.prompts.len()
    }

    /// Whether the registry holds no capabilities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_enabled(&self, name: &str) -> bool {
        self.overrides.get(name).copied().unwrap_or(true)
    }

    fn table(&self, kind: CapabilityKind) -> &IndexMap<String, Capability> {
        match kind {
            CapabilityKind::Tool => &self.tools,
            CapabilityKind::Resource => &self.resources,
            CapabilityKind::Prompt => &self.prompts,
        }
    }

    fn table_mut(&mut self, kind: CapabilityKind) -> &mut IndexMap<String, Capability> {
        match kind {
            CapabilityKind::Tool => &mut self.tools,
            CapabilityKind::Resource => &mut self.resources,
            CapabilityKind::Prompt => &mut self.prompts,
        }
    }
}

const fn entity_for(kind: CapabilityKind) -> Entity {
    match kind {
        CapabilityKind::Tool => Entity::Tool,
        CapabilityKind::Resource => Entity::Resource,
        CapabilityKind::Prompt => Entity::Prompt,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::backend::RestBackend;

    fn test_backend() -> RestBackend {
        RestBackend::new("http://backend.invalid", 1).unwrap()
    }

    fn echo_tool() -> Capability {
        Capability::tool("echo")
            .description("Echo the input")
            .input_schema(serde_json::json!({
                "type": "object",
                "properties": {"msg": {"type": "string"}},
                "required": ["msg"]
            }))
            .callback_fn(|args| Ok(serde_json::json!({"echo": args.get("msg")})))
    }

    #[test]
    fn duplicate_registration_fails_and_leaves_first_intact() {
        let mut registry = CapabilityRegistry::new();
        registry.register(echo_tool()).unwrap();

        let result = registry.register(
            Capability::tool("echo")
                .description("Impostor")
                .callback_fn(|_| Ok(Value::Null)),
        );
        assert!(matches!(result, Err(RegistryError::DuplicateName { .. })));

        let kept = registry.get(CapabilityKind::Tool, "echo").unwrap();
        assert_eq!(kept.description, "Echo the input");
    }

    #[test]
    fn same_name_different_kind_is_allowed() {
        let mut registry = CapabilityRegistry::new();
        registry.register(echo_tool()).unwrap();
        registry
            .register(
                Capability::prompt("echo")
                    .description("Prompt named echo")
                    .messages(vec![PromptMessage::user("{msg}")])
                    .callback_fn(|_| Ok(Value::Null)),
            )
            .unwrap();

        assert_eq!(registry.list(CapabilityKind::Tool).len(), 1);
        assert_eq!(registry.list(CapabilityKind::Prompt).len(), 1);
    }

    #[test]
    fn rejects_invalid_name() {
        let mut registry = CapabilityRegistry::new();
        let result = registry.register(
            Capability::tool("bad name!")
                .callback_fn(|_| Ok(Value::Null)),
        );
        assert!(matches!(result, Err(RegistryError::InvalidName { .. })));
    }

    #[test]
    fn rejects_invalid_schema() {
        let mut registry = CapabilityRegistry::new();
        let result = registry.register(
            Capability::tool("broken")
                .input_schema(serde_json::json!({"type": "object", "required": ["ghost"]}))
                .callback_fn(|_| Ok(Value::Null)),
        );
        assert!(matches!(result, Err(RegistryError::InvalidSchema { .. })));
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut registry = CapabilityRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(Capability::tool(name).callback_fn(|_| Ok(Value::Null)))
                .unwrap();
        }

        let names: Vec<&str> = registry
            .list(CapabilityKind::Tool)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn override_hides_capability_from_list_and_get() {
        let mut overrides = HashMap::new();
        overrides.insert("echo".to_string(), false);
        let mut registry = CapabilityRegistry::with_overrides(overrides);
        registry.register(echo_tool()).unwrap();

        assert!(registry.list(CapabilityKind::Tool).is_empty());
        assert!(registry.get(CapabilityKind::Tool, "echo").is_err());
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_not_found() {
        let registry = CapabilityRegistry::new();
        let result = registry
            .invoke("ghost", &Map::new(), &test_backend())
            .await;
        assert!(matches!(result, Err(McpError::NotFound { .. })));
    }

    #[tokio::test]
    async fn invoke_runs_callback() {
        let mut registry = CapabilityRegistry::new();
        registry.register(echo_tool()).unwrap();

        let mut args = Map::new();
        args.insert("msg".to_string(), Value::String("hi".to_string()));

        let result = registry.invoke("echo", &args, &test_backend()).await.unwrap();
        assert_eq!(result, serde_json::json!({"echo": "hi"}));
    }

    #[tokio::test]
    async fn permission_gate_blocks_and_skips_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                Capability::tool("guarded")
                    .permission_check(|_| false)
                    .callback_fn(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(Value::Null)
                    }),
            )
            .unwrap();

        let result = registry
            .invoke("guarded", &Map::new(), &test_backend())
            .await;

        match result {
            Err(McpError::PermissionDenied { capability }) => {
                assert_eq!(capability, "guarded");
            }
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_error_becomes_execution_error() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                Capability::tool("failing")
                    .callback_fn(|_| Err("it broke".to_string())),
            )
            .unwrap();

        let result = registry
            .invoke("failing", &Map::new(), &test_backend())
            .await;
        match result {
            Err(McpError::Execution(msg)) => assert_eq!(msg, "it broke"),
            other => panic!("expected Execution, got {other:?}"),
        }
    }

    #[test]
    fn resource_lookup_by_uri() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register(
                Capability::resource("catalog", "store://catalog")
                    .description("Catalog summary")
                    .callback_fn(|_| Ok(serde_json::json!({"products": 0}))),
            )
            .unwrap();

        assert!(registry.get_resource_by_uri("store://catalog").is_ok());
        assert!(registry.get_resource_by_uri("store://missing").is_err());
    }
}
