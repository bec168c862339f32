//! Built-in storefront capabilities.
//!
//! Bootstrap is explicit and ordered: build the registry, register the
//! built-in capability set (when `capabilities.enabled` is true), then hand
//! the registry to the caller to freeze behind an `Arc`. Nothing registers
//! itself from the side.
//!
//! Most tools are REST aliases onto the store backend; `search_products`
//! carries local fallback logic and is a direct handler.

pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::backend::RestBackend;
use crate::config::Config;
use crate::registry::{
    Annotations, Capability, CapabilityHandler, CapabilityRegistry, PromptMessage, RegistryError,
};

/// Product search with a client-side keyword fallback.
///
/// Queries the backend's search route first; when it returns no hits, the
/// product list is fetched and ranked locally so that near-miss queries
/// still produce results.
struct SearchProductsHandler {
    backend: Arc<RestBackend>,
}

#[async_trait]
impl CapabilityHandler for SearchProductsHandler {
    async fn call(&self, args: &Map<String, Value>) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing required argument 'query'".to_string())?;
        let limit = args
            .get("limit")
            .and_then(Value::as_u64)
            .unwrap_or(10)
            .min(50) as usize;

        let mut search_args = Map::new();
        search_args.insert("search".to_string(), Value::String(query.to_string()));
        search_args.insert("per_page".to_string(), json!(limit));

        let primary = self
            .backend
            .call("GET", "/products", &search_args)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(hits) = primary.as_array() {
            if !hits.is_empty() {
                return Ok(json!({"products": hits, "fallback": false}));
            }
        }

        debug!(query = %query, "Backend search empty, using keyword fallback");

        let mut list_args = Map::new();
        list_args.insert("per_page".to_string(), json!(100));
        let all = self
            .backend
            .call("GET", "/products", &list_args)
            .await
            .map_err(|e| e.to_string())?;

        let products = all.as_array().map(Vec::as_slice).unwrap_or_default();
        let ranked = search::rank_products(query, products, limit);

        Ok(json!({"products": ranked, "fallback": true}))
    }
}

/// Builds the capability registry from configuration.
///
/// # Errors
///
/// Returns a [`RegistryError`] on any registration conflict — a fatal
/// configuration error that aborts startup.
pub fn build_registry(
    config: &Config,
    backend: &Arc<RestBackend>,
) -> Result<CapabilityRegistry, RegistryError> {
    let mut registry =
        CapabilityRegistry::with_overrides(config.capabilities.overrides.clone());

    if !config.capabilities.enabled {
        info!("Capabilities disabled by configuration; registry is empty");
        return Ok(registry);
    }

    register_tools(&mut registry, backend)?;
    register_resources(&mut registry)?;
    register_prompts(&mut registry)?;

    info!(count = registry.len(), "Capability registry built");
    Ok(registry)
}

fn register_tools(
    registry: &mut CapabilityRegistry,
    backend: &Arc<RestBackend>,
) -> Result<(), RegistryError> {
    registry.register(
        Capability::tool("list_products")
            .description("List products in the store catalog, paginated.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer", "description": "Page number, 1-based"},
                    "per_page": {"type": "integer", "description": "Products per page"},
                    "category": {"type": "string", "description": "Filter by category slug"}
                }
            }))
            .annotations(Annotations::read_only("List products"))
            .rest_alias("GET", "/products"),
    )?;

    registry.register(
        Capability::tool("get_product")
            .description("Fetch a single product by its identifier.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer", "description": "Product identifier"}
                },
                "required": ["id"]
            }))
            .annotations(Annotations::read_only("Get product"))
            .rest_alias("GET", "/products/{id}"),
    )?;

    registry.register(
        Capability::tool("search_products")
            .description(
                "Search products by keyword. Falls back to fuzzy keyword matching \
                 when the store search returns nothing.",
            )
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search terms"},
                    "limit": {"type": "integer", "description": "Maximum results (default 10)"}
                },
                "required": ["query"]
            }))
            .annotations(Annotations::read_only("Search products"))
            .callback(SearchProductsHandler {
                backend: Arc::clone(backend),
            }),
    )?;

    registry.register(
        Capability::tool("get_order")
            .description("Fetch a single order by its identifier.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer", "description": "Order identifier"}
                },
                "required": ["id"]
            }))
            .annotations(Annotations::read_only("Get order"))
            .rest_alias("GET", "/orders/{id}"),
    )?;

    registry.register(
        Capability::tool("list_customers")
            .description("List customer accounts, paginated.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "page": {"type": "integer", "description": "Page number, 1-based"},
                    "per_page": {"type": "integer", "description": "Customers per page (max 100)"}
                }
            }))
            .annotations(Annotations::read_only("List customers"))
            // Page-size cap; oversized requests are refused outright.
            .permission_check(|args| {
                args.get("per_page")
                    .and_then(Value::as_i64)
                    .map_or(true, |n| (1..=100).contains(&n))
            })
            .rest_alias("GET", "/customers"),
    )?;

    registry.register(
        Capability::tool("create_cart_item")
            .description("Add a product to the active cart.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "product_id": {"type": "integer", "description": "Product identifier"},
                    "quantity": {"type": "integer", "description": "Quantity to add"}
                },
                "required": ["product_id"]
            }))
            .annotations(Annotations::destructive("Add to cart"))
            .rest_alias("POST", "/cart/items"),
    )?;

    Ok(())
}

fn register_resources(registry: &mut CapabilityRegistry) -> Result<(), RegistryError> {
    registry.register(
        Capability::resource("catalog_summary", "store://catalog")
            .description("Store catalog summary: product and category counts.")
            .rest_alias("GET", "/catalog/summary"),
    )?;

    registry.register(
        Capability::resource("store_settings", "store://settings")
            .description("Public store settings: currency, locale, units.")
            .rest_alias("GET", "/settings"),
    )?;

    Ok(())
}

fn register_prompts(registry: &mut CapabilityRegistry) -> Result<(), RegistryError> {
    registry.register(
        Capability::prompt("describe_product")
            .description("Draft a storefront description for a product.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Product name"},
                    "tone": {"type": "string", "description": "Writing tone"}
                },
                "required": ["name"]
            }))
            .messages(vec![PromptMessage::user(
                "Write a {tone} storefront description for the product \"{name}\". \
                 Keep it under 120 words and end with a call to action.",
            )])
            .callback_fn(|_| Ok(Value::Null)),
    )?;

    registry.register(
        Capability::prompt("order_followup")
            .description("Draft a follow-up message for a recent order.")
            .input_schema(json!({
                "type": "object",
                "properties": {
                    "order_id": {"type": "string", "description": "Order identifier"},
                    "customer_name": {"type": "string", "description": "Customer display name"}
                },
                "required": ["order_id"]
            }))
            .messages(vec![PromptMessage::user(
                "Write a friendly follow-up message to {customer_name} about order \
                 {order_id}, asking whether everything arrived as expected.",
            )])
            .callback_fn(|_| Ok(Value::Null)),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CapabilityKind;

    fn test_config() -> Config {
        serde_json::from_str("{}").unwrap()
    }

    fn test_backend() -> Arc<RestBackend> {
        Arc::new(RestBackend::new("http://backend.invalid", 1).unwrap())
    }

    #[test]
    fn builds_full_registry() {
        let registry = build_registry(&test_config(), &test_backend()).unwrap();

        assert_eq!(registry.list(CapabilityKind::Tool).len(), 6);
        assert_eq!(registry.list(CapabilityKind::Resource).len(), 2);
        assert_eq!(registry.list(CapabilityKind::Prompt).len(), 2);
    }

    #[test]
    fn disabled_flag_yields_empty_registry() {
        let config: Config =
            serde_json::from_str(r#"{"capabilities": {"enabled": false}}"#).unwrap();
        let registry = build_registry(&config, &test_backend()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn overrides_disable_individual_tools() {
        let config: Config = serde_json::from_str(
            r#"{"capabilities": {"overrides": {"create_cart_item": false}}}"#,
        )
        .unwrap();
        let registry = build_registry(&config, &test_backend()).unwrap();

        assert_eq!(registry.list(CapabilityKind::Tool).len(), 5);
        assert!(registry
            .get(CapabilityKind::Tool, "create_cart_item")
            .is_err());
    }

    #[test]
    fn tools_appear_in_registration_order() {
        let registry = build_registry(&test_config(), &test_backend()).unwrap();
        let names: Vec<&str> = registry
            .list(CapabilityKind::Tool)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "list_products",
                "get_product",
                "search_products",
                "get_order",
                "list_customers",
                "create_cart_item"
            ]
        );
    }

    #[tokio::test]
    async fn oversized_customer_page_is_refused() {
        let registry = build_registry(&test_config(), &test_backend()).unwrap();
        let mut args = Map::new();
        args.insert("per_page".to_string(), json!(500));

        let result = registry
            .invoke("list_customers", &args, &test_backend())
            .await;
        assert!(matches!(
            result,
            Err(crate::error::McpError::PermissionDenied { .. })
        ));
    }
}
