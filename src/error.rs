//! Error types for storefront-mcp.
//!
//! Two families live here: [`ConfigError`] for startup/configuration
//! failures, and [`McpError`] — the protocol error taxonomy. Every failure a
//! capability, the token manager, or the router can produce is funnelled
//! through [`McpError`] so both transports emit byte-identical JSON-RPC
//! error bodies.
//!
//! # Security Note
//!
//! Token validation failures all collapse into [`McpError::InvalidToken`]
//! with a single fixed message, so a caller cannot distinguish "unknown jti"
//! from "revoked" or "expired" and probe the token registry.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// The kind of named entity a lookup failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// A registered tool.
    Tool,
    /// A registered resource.
    Resource,
    /// A registered prompt.
    Prompt,
    /// An issued token (by `jti`).
    Token,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
            Self::Token => "token",
        };
        f.write_str(s)
    }
}

/// Protocol-level error taxonomy.
///
/// Each variant maps to exactly one JSON-RPC numeric code (via [`code`]) and
/// one HTTP status (via [`http_status`]), so the mapping lives in one place
/// for both transports.
///
/// [`code`]: McpError::code
/// [`http_status`]: McpError::http_status
#[derive(Error, Debug)]
pub enum McpError {
    /// The message body was not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),

    /// The message was valid JSON but not a valid JSON-RPC message.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested method is not supported.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A named entity does not exist (or is disabled).
    #[error("{kind} not found: {name}")]
    NotFound {
        /// The entity family that was searched.
        kind: Entity,
        /// The name or URI that failed to resolve.
        name: String,
    },

    /// The request parameters were missing or malformed.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// A permission predicate refused the call.
    #[error("permission denied for capability '{capability}'")]
    PermissionDenied {
        /// Name of the refused capability.
        capability: String,
    },

    /// A capability callback or the backend reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The requested token lifetime falls outside the configured bounds.
    #[error("invalid expiration: requested {requested}s, allowed {min}s-{max}s")]
    InvalidExpiration {
        /// Requested lifetime in seconds.
        requested: i64,
        /// Configured minimum lifetime.
        min: i64,
        /// Configured maximum lifetime.
        max: i64,
    },

    /// The presented credential failed verification.
    ///
    /// Deliberately carries no detail; see the module security note.
    #[error("invalid token")]
    InvalidToken,

    /// The REST backend rejected the request with an error status.
    #[error("backend error: {0}")]
    Backend(String),

    /// Something unexpected happened (I/O failure, timeout, serialisation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Returns the JSON-RPC numeric code for this error.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) | Self::NotFound { .. } => -32601,
            Self::InvalidParams(_) | Self::InvalidExpiration { .. } => -32602,
            Self::Internal(_) => -32603,
            Self::PermissionDenied { .. }
            | Self::Execution(_)
            | Self::InvalidToken
            | Self::Backend(_) => -32000,
        }
    }

    /// Returns the HTTP status code used when this error surfaces on the
    /// streamable transport.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Parse(_)
            | Self::InvalidRequest(_)
            | Self::InvalidParams(_)
            | Self::InvalidExpiration { .. } => 400,
            Self::PermissionDenied { .. } | Self::InvalidToken => 403,
            Self::MethodNotFound(_) | Self::NotFound { .. } => 404,
            Self::Execution(_) | Self::Backend(_) | Self::Internal(_) => 500,
        }
    }
}
