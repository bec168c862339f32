//! Streamable HTTP transport.
//!
//! One endpoint (`/mcp`) accepts POST for JSON-RPC payloads and GET for
//! health checks or the legacy SSE handshake. Token lifecycle endpoints
//! (`/token`, `/revoke`, `/tokens`) live beside it.
//!
//! Authentication is resolved per request before the router runs. The
//! `auth.required` policy is baked in at startup: when disabled, callers run
//! as the anonymous read-only principal and the token endpoints operate
//! without credentials.
//!
//! A successful `initialize` creates a session; its UUID is returned in the
//! `Mcp-Session-Id` response header and echoed by well-behaved clients on
//! subsequent calls. Sessions are correlation-only and expire after an hour.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{Principal, TokenManager};
use crate::error::McpError;
use crate::mcp::protocol::JsonRpcError;
use crate::mcp::router::Router;

/// Lifetime of a correlation session.
const SESSION_TTL: Duration = Duration::from_secs(3600);

/// Interval between SSE heartbeat frames.
const SSE_HEARTBEAT: Duration = Duration::from_secs(15);

/// Shared state behind the HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    router: Arc<Router>,
    tokens: Arc<TokenManager>,
    auth_required: bool,
    sse_max_duration: Duration,
    sessions: Arc<RwLock<HashMap<String, Instant>>>,
}

impl HttpState {
    /// Creates the transport state.
    #[must_use]
    pub fn new(
        router: Arc<Router>,
        tokens: Arc<TokenManager>,
        auth_required: bool,
        sse_max_duration_secs: u64,
    ) -> Self {
        Self {
            router,
            tokens,
            auth_required,
            sse_max_duration: Duration::from_secs(sse_max_duration_secs),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a new correlation session, pruning expired ones.
    async fn open_session(&self) -> String {
        let session_id = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, created| created.elapsed() < SESSION_TTL);
        sessions.insert(session_id.clone(), Instant::now());
        info!(session_id = %session_id, "Session opened");
        session_id
    }

    /// Whether a session id is currently known (correlation only).
    pub async fn has_session(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Resolves the request principal from headers.
    fn resolve_principal(&self, headers: &HeaderMap) -> Result<Principal, McpError> {
        if !self.auth_required {
            return Ok(Principal::Anonymous);
        }

        let token = extract_bearer(headers).ok_or(McpError::InvalidToken)?;
        self.tokens.validate(token)
    }
}

/// Extracts a bearer token from the `Authorization` header.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Builds the axum application.
#[must_use]
pub fn build_app(state: HttpState) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    axum::Router::new()
        .route("/mcp", post(mcp_post).get(mcp_get))
        .route("/token", post(token_issue))
        .route("/revoke", post(token_revoke))
        .route("/tokens", get(token_list))
        .layer(cors)
        .with_state(state)
}

/// Binds and serves until a termination signal arrives.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(state: HttpState, bind_addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Streamable HTTP transport listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(windows)]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, shutting down");
    }
}

/// Builds an HTTP error response carrying a JSON-RPC error envelope.
fn error_response(error: &McpError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(JsonRpcError::from_mcp(None, error))).into_response()
}

/// POST handler: the JSON-RPC entry point.
async fn mcp_post(State(state): State<HttpState>, headers: HeaderMap, body: String) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("application/json") {
        return error_response(&McpError::InvalidRequest(format!(
            "unsupported content type '{content_type}'"
        )));
    }

    let principal = match state.resolve_principal(&headers) {
        Ok(p) => p,
        Err(e) => {
            warn!("Rejected unauthenticated request");
            return error_response(&e);
        }
    };

    if let Some(session) = headers
        .get("mcp-session-id")
        .and_then(|v| v.to_str().ok())
    {
        debug!(session_id = %session, "Request correlated to session");
    }

    // Transport-level rejection of unparseable bodies, before the router.
    let parsed: Result<Value, _> = serde_json::from_str(&body);
    let Ok(parsed) = parsed else {
        return error_response(&McpError::Parse("request body is not valid JSON".to_string()));
    };

    let reply = state.router.handle_payload(&body, &principal).await;

    match reply {
        None => StatusCode::ACCEPTED.into_response(),
        Some(reply) => {
            // A successful initialize opens a correlation session.
            if is_initialize(&parsed) && reply.get("result").is_some() {
                let session_id = state.open_session().await;
                return (
                    StatusCode::OK,
                    [("Mcp-Session-Id", session_id)],
                    Json(reply),
                )
                    .into_response();
            }
            (StatusCode::OK, Json(reply)).into_response()
        }
    }
}

/// Whether a payload is a lone initialize request.
fn is_initialize(payload: &Value) -> bool {
    payload.get("method").and_then(Value::as_str) == Some("initialize")
}

/// GET handler: SSE compatibility handshake or health check.
async fn mcp_get(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let wants_sse = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"));

    if wants_sse {
        return sse_handshake(state.sse_max_duration).into_response();
    }

    Json(json!({
        "status": "ok",
        "server": crate::mcp::protocol::SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "transport": "streamable-http",
    }))
    .into_response()
}

/// Legacy SSE handshake: announce the endpoint, heartbeat, then close.
///
/// Old HTTP+SSE clients expect an `endpoint` event naming the URL to POST
/// to before they send anything. The stream exists only to satisfy that
/// handshake and closes after a bounded duration.
fn sse_handshake(max_duration: Duration) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        yield Ok(Event::default().event("endpoint").data("/mcp"));

        let deadline = tokio::time::Instant::now() + max_duration;
        let mut heartbeat = tokio::time::interval(SSE_HEARTBEAT);
        heartbeat.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().event("heartbeat").data("ping"));
                }
                () = tokio::time::sleep_until(deadline) => {
                    debug!("SSE compatibility stream reached max duration");
                    break;
                }
            }
        }
    };

    Sse::new(stream)
}

#[derive(Debug, Deserialize)]
struct TokenIssueRequest {
    username: String,
    password: String,
    #[serde(default)]
    ttl_secs: Option<i64>,
}

/// POST /token: credential exchange.
async fn token_issue(
    State(state): State<HttpState>,
    Json(request): Json<TokenIssueRequest>,
) -> Response {
    let Some(principal) = state
        .tokens
        .authenticate(&request.username, &request.password)
    else {
        warn!(username = %request.username, "Credential exchange failed");
        return error_response(&McpError::InvalidToken);
    };

    let ttl = request.ttl_secs.unwrap_or_else(|| state.tokens.default_ttl());
    match state.tokens.issue(&request.username, ttl) {
        Ok(issued) => {
            debug!(principal = %principal, jti = %issued.jti, "Token issued over HTTP");
            (StatusCode::OK, Json(issued)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
struct TokenRevokeRequest {
    jti: String,
}

/// POST /revoke: revoke one token by `jti`.
///
/// A user may revoke their own tokens; revoking another user's token
/// requires the admin flag.
async fn token_revoke(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Json(request): Json<TokenRevokeRequest>,
) -> Response {
    let principal = match state.resolve_principal(&headers) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    if state.auth_required && !principal.is_admin() {
        let owner = state.tokens.get(&request.jti).map(|r| r.user_id);
        let is_own = matches!(
            (&principal, owner.as_deref()),
            (Principal::User { name, .. }, Some(owner)) if name == owner
        );
        if !is_own {
            return error_response(&McpError::PermissionDenied {
                capability: "revoke".to_string(),
            });
        }
    }

    match state.tokens.revoke(&request.jti) {
        Ok(()) => (StatusCode::OK, Json(json!({"revoked": request.jti}))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /tokens: admin-only listing with lazy garbage collection.
async fn token_list(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let principal = match state.resolve_principal(&headers) {
        Ok(p) => p,
        Err(e) => return error_response(&e),
    };

    if state.auth_required && !principal.is_admin() {
        return error_response(&McpError::PermissionDenied {
            capability: "tokens".to_string(),
        });
    }

    let records = state.tokens.list(query.get("user").map(String::as_str));
    (StatusCode::OK, Json(json!({"tokens": records}))).into_response()
}
