//! Model Context Protocol (MCP) implementation.
//!
//! The protocol stack, bottom up:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Transport adapters                    │
//! │      stdio (embedded / proxy)    streamable HTTP+SSE     │
//! └──────────────┬───────────────────────────┬───────────────┘
//!                ▼                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │            Router (dispatch, batches, errors)            │
//! └──────────────┬───────────────────────────┬───────────────┘
//!                ▼                           ▼
//!       Capability Registry          Token/Session Manager
//! ```
//!
//! Both transports normalise incoming bytes into the same JSON-RPC payload
//! type and hand it to one [`router::Router`], so request semantics and
//! error bodies are identical regardless of how a client connects.

pub mod http;
pub mod protocol;
pub mod router;
pub mod stdio;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION};
pub use router::Router;
pub use stdio::{StdioProxy, StdioServer, StdioTransport};
