//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication and token lifetime settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// REST backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Capability registration settings.
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.min_token_ttl_secs < 1 {
            return Err(ConfigError::ValidationError {
                message: "auth.min_token_ttl_secs must be at least 1".to_string(),
            });
        }

        if self.auth.max_token_ttl_secs < self.auth.min_token_ttl_secs {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "auth.max_token_ttl_secs ({}) must be >= auth.min_token_ttl_secs ({})",
                    self.auth.max_token_ttl_secs, self.auth.min_token_ttl_secs
                ),
            });
        }

        if self.auth.required && self.auth.secret.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "auth.secret must be set when auth.required is true".to_string(),
            });
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                message: "backend.timeout_secs must be greater than zero".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid logging level '{}'. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ),
            });
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address the streamable HTTP transport binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// How long (seconds) an SSE compatibility stream stays open.
    #[serde(default = "default_sse_duration")]
    pub sse_max_duration_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            sse_max_duration_secs: default_sse_duration(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8740".to_string()
}

const fn default_sse_duration() -> u64 {
    300
}

/// A configured user principal for credential exchange.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// Login name (also the token subject).
    pub username: String,
    /// Shared secret checked on `POST /token`.
    pub password: String,
    /// Whether this user may list and revoke other users' tokens.
    #[serde(default)]
    pub admin: bool,
}

/// Authentication configuration.
///
/// `required` is read once at startup: it is a per-deployment policy, not a
/// per-request toggle. With `required` false, HTTP callers run as the
/// anonymous read-only principal.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether HTTP requests must carry a verified bearer token.
    #[serde(default)]
    pub required: bool,

    /// HMAC-SHA256 signing secret for issued tokens.
    #[serde(default)]
    pub secret: String,

    /// Minimum accepted token lifetime in seconds.
    #[serde(default = "default_min_ttl")]
    pub min_token_ttl_secs: i64,

    /// Maximum accepted token lifetime in seconds.
    #[serde(default = "default_max_ttl")]
    pub max_token_ttl_secs: i64,

    /// Users accepted by the token exchange endpoint.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: false,
            secret: String::new(),
            min_token_ttl_secs: default_min_ttl(),
            max_token_ttl_secs: default_max_ttl(),
            users: Vec::new(),
        }
    }
}

const fn default_min_ttl() -> i64 {
    3600
}

const fn default_max_ttl() -> i64 {
    86400
}

/// REST backend configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the store's REST API (no trailing slash needed).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds for backend calls.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost/wp-json/store/v1".to_string()
}

const fn default_backend_timeout() -> u64 {
    30
}

/// Capability registration configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilitiesConfig {
    /// Master switch: when false, the registry is built empty.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-capability enabled override, keyed by name. A capability is
    /// listed and callable unless its entry here is explicitly `false`.
    #[serde(default)]
    pub overrides: HashMap<String, bool>,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            overrides: HashMap::new(),
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
