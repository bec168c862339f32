//! Token/Session Manager.
//!
//! Issues, validates, and revokes bearer tokens, and tracks the registry of
//! live tokens. A token moves `issued → valid → (expired | revoked)`; both
//! terminal states end validity, but records stay queryable until the lazy
//! garbage collection that runs as a side effect of listing removes expired
//! and orphaned entries.
//!
//! Mutations (issue/revoke/GC) serialise behind a `std::sync::RwLock`; every
//! operation is synchronous and the guard is never held across an await.

mod jwt;

pub use jwt::Claims;

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Entity, McpError};

/// The authenticated identity a request runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Unauthenticated caller (auth-disabled HTTP); read-only access.
    Anonymous,
    /// The local STDIO client; trusted with full access.
    Local,
    /// A verified token subject.
    User {
        /// Subject name.
        name: String,
        /// Whether the configured user carries the admin flag.
        admin: bool,
    },
}

impl Principal {
    /// Whether this principal may use admin-only operations.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        match self {
            Self::User { admin, .. } => *admin,
            Self::Local => true,
            Self::Anonymous => false,
        }
    }

    /// Whether this principal is restricted to read-only tools.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => f.write_str("anonymous"),
            Self::Local => f.write_str("local"),
            Self::User { name, .. } => f.write_str(name),
        }
    }
}

/// One entry in the token registry.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRecord {
    /// Unique token identifier.
    pub jti: String,
    /// Subject principal.
    pub user_id: String,
    /// Issued-at Unix timestamp.
    pub issued_at: i64,
    /// Expiry Unix timestamp.
    pub expires_at: i64,
    /// Monotonic revocation flag; once true, never reset.
    pub revoked: bool,
}

/// Material returned to the caller of a successful issue.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// The signed credential to present as a bearer token.
    pub token: String,
    /// The token's registry key.
    pub jti: String,
    /// Expiry Unix timestamp.
    pub expires_at: i64,
}

struct UserEntry {
    password: String,
    admin: bool,
}

/// Issues, validates, revokes, and lists bearer tokens.
pub struct TokenManager {
    secret: Vec<u8>,
    min_ttl: i64,
    max_ttl: i64,
    users: HashMap<String, UserEntry>,
    records: RwLock<HashMap<String, TokenRecord>>,
}

impl TokenManager {
    /// Builds a manager from the auth configuration section.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        let users = config
            .users
            .iter()
            .map(|u| {
                (
                    u.username.clone(),
                    UserEntry {
                        password: u.password.clone(),
                        admin: u.admin,
                    },
                )
            })
            .collect();

        Self {
            secret: config.secret.clone().into_bytes(),
            min_ttl: config.min_token_ttl_secs,
            max_ttl: config.max_token_ttl_secs,
            users,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Checks a username/password pair against the configured users.
    ///
    /// Password comparison is constant-time.
    #[must_use]
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Principal> {
        let entry = self.users.get(username)?;
        let matches: bool = entry
            .password
            .as_bytes()
            .ct_eq(password.as_bytes())
            .into();
        matches.then(|| Principal::User {
            name: username.to_string(),
            admin: entry.admin,
        })
    }

    /// Issues a token for `user_id` with the requested lifetime in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidExpiration`] when the requested lifetime
    /// falls outside the configured bounds.
    pub fn issue(&self, user_id: &str, requested_ttl: i64) -> Result<IssuedToken, McpError> {
        self.issue_at(user_id, requested_ttl, Utc::now().timestamp())
    }

    /// Issues a token against the supplied clock timestamp.
    ///
    /// # Errors
    ///
    /// See [`TokenManager::issue`].
    pub fn issue_at(
        &self,
        user_id: &str,
        requested_ttl: i64,
        now: i64,
    ) -> Result<IssuedToken, McpError> {
        if requested_ttl < self.min_ttl || requested_ttl > self.max_ttl {
            return Err(McpError::InvalidExpiration {
                requested: requested_ttl,
                min: self.min_ttl,
                max: self.max_ttl,
            });
        }

        let jti = Uuid::new_v4().simple().to_string();
        let expires_at = now + requested_ttl;
        let claims = Claims {
            jti: jti.clone(),
            sub: user_id.to_string(),
            iat: now,
            exp: expires_at,
        };
        let token = jwt::sign(&claims, &self.secret)?;

        let record = TokenRecord {
            jti: jti.clone(),
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at,
            revoked: false,
        };

        let mut records = self.records.write().expect("token registry poisoned");
        records.insert(jti.clone(), record);
        drop(records);

        info!(user_id = %user_id, jti = %jti, ttl = requested_ttl, "Issued token");

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Validates a bearer credential and resolves its principal.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidToken`] uniformly — signature failure,
    /// unknown `jti`, revocation, and expiry are indistinguishable.
    pub fn validate(&self, credential: &str) -> Result<Principal, McpError> {
        self.validate_at(credential, Utc::now().timestamp())
    }

    /// Validates a credential against the supplied clock timestamp.
    ///
    /// # Errors
    ///
    /// See [`TokenManager::validate`].
    pub fn validate_at(&self, credential: &str, now: i64) -> Result<Principal, McpError> {
        let claims = jwt::verify(credential, &self.secret)?;

        let records = self.records.read().expect("token registry poisoned");
        let record = records.get(&claims.jti).ok_or(McpError::InvalidToken)?;
        if record.revoked || now >= record.expires_at {
            return Err(McpError::InvalidToken);
        }
        let user_id = record.user_id.clone();
        drop(records);

        let admin = self.users.get(&user_id).is_some_and(|u| u.admin);
        Ok(Principal::User {
            name: user_id,
            admin,
        })
    }

    /// The default lifetime granted when a caller does not request one.
    #[must_use]
    pub const fn default_ttl(&self) -> i64 {
        self.min_ttl
    }

    /// Looks up a token record by `jti`.
    #[must_use]
    pub fn get(&self, jti: &str) -> Option<TokenRecord> {
        self.records
            .read()
            .expect("token registry poisoned")
            .get(jti)
            .cloned()
    }

    /// Revokes a token by `jti`. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::NotFound`] when the `jti` is unknown.
    pub fn revoke(&self, jti: &str) -> Result<(), McpError> {
        let mut records = self.records.write().expect("token registry poisoned");
        let record = records.get_mut(jti).ok_or_else(|| McpError::NotFound {
            kind: Entity::Token,
            name: jti.to_string(),
        })?;

        if !record.revoked {
            record.revoked = true;
            info!(jti = %jti, "Revoked token");
        }
        Ok(())
    }

    /// Lists live token records, optionally filtered by user.
    ///
    /// As a side effect, expired entries and entries whose user is no
    /// longer configured are deleted before the remainder is returned.
    #[must_use]
    pub fn list(&self, user_filter: Option<&str>) -> Vec<TokenRecord> {
        self.list_at(user_filter, Utc::now().timestamp())
    }

    /// Lists live records against the supplied clock timestamp.
    #[must_use]
    pub fn list_at(&self, user_filter: Option<&str>, now: i64) -> Vec<TokenRecord> {
        let mut records = self.records.write().expect("token registry poisoned");

        let before = records.len();
        records.retain(|_, r| r.expires_at > now && self.users.contains_key(&r.user_id));
        let swept = before - records.len();
        if swept > 0 {
            debug!(swept, "Garbage-collected token registry");
        }

        let mut remaining: Vec<TokenRecord> = records
            .values()
            .filter(|r| user_filter.map_or(true, |u| r.user_id == u))
            .cloned()
            .collect();
        drop(records);

        remaining.sort_by_key(|r| r.issued_at);
        remaining
    }
}
