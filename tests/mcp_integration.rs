//! Integration tests for MCP protocol handling.
//!
//! These tests drive the router end-to-end through raw JSON payloads,
//! verifying JSON-RPC 2.0 parsing, request/response correlation, batch
//! semantics, and tool invocation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use storefront_mcp::auth::Principal;
use storefront_mcp::backend::RestBackend;
use storefront_mcp::mcp::Router;
use storefront_mcp::registry::{Annotations, Capability, CapabilityRegistry};

fn router_with(registry: CapabilityRegistry) -> Router {
    let backend = RestBackend::new("http://backend.invalid", 1).unwrap();
    Router::new(Arc::new(registry), Arc::new(backend))
}

fn echo_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(
            Capability::tool("echo")
                .description("Echo the message back")
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
}

async fn dispatch(router: &Router, raw: &str) -> Option<Value> {
    router.handle_payload(raw, &Principal::Local).await
}

// =============================================================================
// End-to-end scenario
// =============================================================================

#[tokio::test]
async fn echo_tool_end_to_end() {
    let router = router_with(echo_registry());

    // initialize
    let reply = dispatch(
        &router,
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test-client","version":"1.0.0"}}}"#,
    )
    .await
    .unwrap();
    assert_eq!(reply["result"]["protocolVersion"], "2024-11-05");

    // initialized notification produces no reply
    assert!(dispatch(
        &router,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#
    )
    .await
    .is_none());

    // the tool appears in the listing
    let reply = dispatch(&router, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
        .await
        .unwrap();
    assert_eq!(reply["result"]["tools"][0]["name"], "echo");

    // calling it wraps the result as a single text content element
    let reply = dispatch(
        &router,
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"echo","arguments":{"msg":"hi"}}}"#,
    )
    .await
    .unwrap();

    assert_eq!(reply["id"], 3);
    assert_eq!(
        reply["result"]["content"],
        json!([{"type": "text", "text": "{\"echo\":\"hi\"}"}])
    );
}

// =============================================================================
// Malformed payloads
// =============================================================================

#[tokio::test]
async fn invalid_json_yields_parse_error() {
    let router = router_with(echo_registry());
    let reply = dispatch(&router, "not valid json").await.unwrap();
    assert_eq!(reply["error"]["code"], -32700);
}

#[tokio::test]
async fn missing_jsonrpc_yields_invalid_request() {
    let router = router_with(echo_registry());
    let reply = dispatch(&router, r#"{"id":1,"method":"ping"}"#).await.unwrap();
    assert_eq!(reply["error"]["code"], -32600);
}

#[tokio::test]
async fn unknown_method_yields_method_not_found() {
    let router = router_with(echo_registry());
    let reply = dispatch(&router, r#"{"jsonrpc":"2.0","id":1,"method":"bogus"}"#)
        .await
        .unwrap();

    assert_eq!(reply["id"], 1);
    assert_eq!(reply["error"]["code"], -32601);
    assert!(reply["error"]["message"].as_str().unwrap().contains("bogus"));
}

// =============================================================================
// Batch semantics
// =============================================================================

#[tokio::test]
async fn notification_only_batch_has_no_body() {
    let router = router_with(echo_registry());
    let raw = r#"[
        {"jsonrpc":"2.0","method":"notifications/one"},
        {"jsonrpc":"2.0","method":"notifications/two"},
        {"jsonrpc":"2.0","method":"notifications/three"}
    ]"#;
    assert!(dispatch(&router, raw).await.is_none());
}

#[tokio::test]
async fn mixed_batch_answers_requests_in_order() {
    let router = router_with(echo_registry());
    let raw = r#"[
        {"jsonrpc":"2.0","id":"a","method":"ping"},
        {"jsonrpc":"2.0","method":"notifications/initialized"},
        {"jsonrpc":"2.0","id":"b","method":"tools/list"}
    ]"#;
    let reply = dispatch(&router, raw).await.unwrap();

    let replies = reply.as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], "a");
    assert_eq!(replies[1]["id"], "b");
}

#[tokio::test]
async fn peer_responses_in_batch_are_ignored() {
    let router = router_with(echo_registry());
    let raw = r#"[
        {"jsonrpc":"2.0","id":9,"result":{"ok":true}},
        {"jsonrpc":"2.0","id":1,"method":"ping"}
    ]"#;
    let reply = dispatch(&router, raw).await.unwrap();

    // Only the request gets an answer; a lone answer is a single object.
    assert!(reply.is_object());
    assert_eq!(reply["id"], 1);
}

#[tokio::test]
async fn empty_batch_is_invalid_request() {
    let router = router_with(echo_registry());
    let reply = dispatch(&router, "[]").await.unwrap();
    assert_eq!(reply["error"]["code"], -32600);
}

// =============================================================================
// Permission gate
// =============================================================================

#[tokio::test]
async fn permission_gate_blocks_without_invoking_callback() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut registry = CapabilityRegistry::new();
    registry
        .register(
            Capability::tool("restricted")
                .description("Never allowed")
                .permission_check(|_| false)
                .callback_fn(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }),
        )
        .unwrap();
    let router = router_with(registry);

    let reply = dispatch(
        &router,
        r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"restricted"}}"#,
    )
    .await
    .unwrap();

    assert_eq!(reply["error"]["code"], -32000);
    assert!(reply["error"]["message"]
        .as_str()
        .unwrap()
        .contains("restricted"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Error body parity across entry points
// =============================================================================

#[tokio::test]
async fn single_message_and_batch_member_produce_identical_errors() {
    let router = router_with(echo_registry());

    let single = dispatch(&router, r#"{"jsonrpc":"2.0","id":1,"method":"nope"}"#)
        .await
        .unwrap();
    let batched = dispatch(&router, r#"[{"jsonrpc":"2.0","id":1,"method":"nope"}]"#)
        .await
        .unwrap();

    assert_eq!(single, batched);
}
