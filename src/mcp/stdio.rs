//! STDIO transport.
//!
//! Messages are UTF-8 JSON, one per line; stdin carries client messages,
//! stdout carries replies, stderr is reserved for logging. Exactly one
//! output line is written per non-notification payload, flushed
//! immediately.
//!
//! Two modes share the line discipline:
//!
//! - **Embedded**: [`StdioServer`] dispatches through the in-process
//!   [`Router`] as the trusted `local` principal.
//! - **Proxy**: [`StdioProxy`] forwards each line as an HTTP POST to a
//!   remote streamable endpoint and relays the reply — the shape used when
//!   a local MCP client talks to a remote store.
//!
//! Malformed input lines are logged and skipped; the loop never crashes on
//! bad input and terminates gracefully at end-of-input.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::auth::Principal;
use crate::mcp::router::Router;

/// Line-oriented stdio wiring shared by both modes.
pub struct StdioTransport {
    reader: BufReader<tokio::io::Stdin>,
    writer: tokio::io::Stdout,
}

impl StdioTransport {
    /// Creates a transport over the process stdio handles.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }

    /// Reads the next input line. `None` means stdin reached EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from stdin fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        Ok(Some(line))
    }

    /// Writes one JSON line to stdout and flushes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn write_line(&mut self, json: &str) -> io::Result<()> {
        // One message per line: embedded newlines would desynchronise the stream.
        debug_assert!(!json.contains('\n'), "message must not contain newlines");

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Serialises and writes a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation or writing fails.
    pub async fn write_value(&mut self, value: &serde_json::Value) -> io::Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.write_line(&json).await
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Embedded-mode STDIO server: one process, one client, dispatching through
/// the in-process router.
pub struct StdioServer {
    router: Arc<Router>,
    transport: StdioTransport,
}

impl StdioServer {
    /// Creates a server over the given router.
    #[must_use]
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            transport: StdioTransport::new(),
        }
    }

    /// Runs the read loop until EOF or a termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(unix)]
    pub async fn run(&mut self) -> io::Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(io::Error::other)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(io::Error::other)?;

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down");
                    return Ok(());
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                    return Ok(());
                }

                line = self.transport.read_line() => {
                    let Some(line) = line? else {
                        info!("stdin closed, shutting down");
                        return Ok(());
                    };
                    self.handle_line(&line).await?;
                }
            }
        }
    }

    /// Runs the read loop until EOF or Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if transport I/O fails.
    #[cfg(windows)]
    pub async fn run(&mut self) -> io::Result<()> {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received Ctrl+C, shutting down");
                    return Ok(());
                }

                line = self.transport.read_line() => {
                    let Some(line) = line? else {
                        info!("stdin closed, shutting down");
                        return Ok(());
                    };
                    self.handle_line(&line).await?;
                }
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> io::Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        // Unparseable lines are logged and skipped; the loop stays alive.
        if serde_json::from_str::<serde_json::Value>(line).is_err() {
            warn!(len = line.len(), "Skipping malformed input line");
            return Ok(());
        }

        if let Some(reply) = self.router.handle_payload(line, &Principal::Local).await {
            self.transport.write_value(&reply).await?;
        }
        Ok(())
    }
}

/// Proxy-mode STDIO bridge: forwards each line to a remote streamable HTTP
/// endpoint and relays replies.
pub struct StdioProxy {
    endpoint: String,
    bearer: Option<String>,
    client: reqwest::Client,
    session_id: Option<String>,
    transport: StdioTransport,
}

impl StdioProxy {
    /// Creates a proxy targeting `endpoint`, optionally attaching a bearer
    /// token to every forwarded request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>, bearer: Option<String>) -> io::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(io::Error::other)?;

        Ok(Self {
            endpoint: endpoint.into(),
            bearer,
            client,
            session_id: None,
            transport: StdioTransport::new(),
        })
    }

    /// Runs the forwarding loop until EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if stdio I/O fails. Remote failures are reported to
    /// the client as JSON-RPC internal errors, not loop termination.
    pub async fn run(&mut self) -> io::Result<()> {
        info!(endpoint = %self.endpoint, "Proxying stdio to remote endpoint");

        while let Some(line) = self.transport.read_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if serde_json::from_str::<serde_json::Value>(&line).is_err() {
                warn!(len = line.len(), "Skipping malformed input line");
                continue;
            }

            match self.forward(&line).await {
                Ok(Some(reply)) => self.transport.write_line(&reply).await?,
                Ok(None) => debug!("Remote accepted payload without content"),
                Err(message) => {
                    warn!(error = %message, "Forwarding failed");
                    let envelope = serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": null,
                        "error": {"code": -32603, "message": message},
                    });
                    self.transport.write_value(&envelope).await?;
                }
            }
        }

        info!("stdin closed, proxy shutting down");
        Ok(())
    }

    /// Forwards one payload; `Ok(None)` when the remote answered 202.
    async fn forward(&mut self, payload: &str) -> Result<Option<String>, String> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .body(payload.to_string());

        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        if let Some(session) = &self.session_id {
            request = request.header("Mcp-Session-Id", session.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("remote endpoint unreachable: {e}"))?;

        // The remote assigns a session on initialize; echo it afterwards.
        if let Some(session) = response
            .headers()
            .get("Mcp-Session-Id")
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(session.to_string());
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read remote reply: {e}"))?;

        if status.as_u16() == 202 || body.is_empty() {
            return Ok(None);
        }

        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_default() {
        let _transport = StdioTransport::default();
    }

    #[tokio::test]
    async fn serialised_replies_have_no_newlines() {
        let value = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"message": "hello world", "nested": {"key": "value"}},
        });
        let json = serde_json::to_string(&value).unwrap();
        assert!(!json.contains('\n'));
    }

    #[test]
    fn proxy_construction() {
        let proxy = StdioProxy::new("http://127.0.0.1:8740/mcp", Some("tok".to_string()));
        assert!(proxy.is_ok());
    }
}
