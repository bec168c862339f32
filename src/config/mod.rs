//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path specified via the `CONFIG_FILE` CLI argument
//! 2. Default location:
//!    - **Linux/macOS:** `~/.storefront-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.storefront-mcp\config.json`
//!
//! A missing config file is not fatal: the server starts with defaults
//! (anonymous read-only HTTP access, no backend credentials) so that a local
//! STDIO session works out of the box.

mod settings;

pub use settings::{
    AuthConfig, BackendConfig, CapabilitiesConfig, Config, LoggingConfig, ServerConfig, UserConfig,
};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.storefront-mcp/`
/// - **Windows:** `%USERPROFILE%\.storefront-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".storefront-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, uses the platform-specific default location; if no
/// file exists there, built-in defaults are returned instead. An explicitly
/// supplied path that does not exist is an error.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly supplied configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Validation of the parsed settings fails
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                let config = Config::default();
                config.validate()?;
                return Ok(config);
            }
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    config.validate()?;

    Ok(config)
}
