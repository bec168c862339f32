//! storefront-mcp: MCP server exposing a store's content and commerce data
//! to AI assistants.
//!
//! The server speaks JSON-RPC 2.0 over two transports — streamable HTTP
//! (with a legacy SSE handshake) and newline-delimited STDIO — and exposes
//! the store's catalog, orders, and settings as MCP tools, resources, and
//! prompts. Most capabilities forward to the store's REST backend; a few
//! carry local logic such as the keyword search fallback.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Error taxonomy (configuration + protocol)
//! - [`registry`] — Capability registry
//! - [`auth`] — Token issue/validate/revoke and principals
//! - [`backend`] — REST backend client
//! - [`mcp`] — Protocol engine and transports
//! - [`catalog`] — Built-in storefront capability set

pub mod auth;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod mcp;
pub mod registry;
