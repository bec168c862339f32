//! HS256 JWT signing and verification.
//!
//! Tokens use the compact serialisation `header.payload.signature` with
//! base64url (no padding) segments and an HMAC-SHA256 signature. Only the
//! HS256 algorithm is accepted; a token whose header names anything else is
//! rejected outright.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::McpError;

type HmacSha256 = Hmac<Sha256>;

/// Registered claims carried by an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Unique token identifier (registry key).
    pub jti: String,
    /// Subject principal (user id).
    pub sub: String,
    /// Issued-at Unix timestamp.
    pub iat: i64,
    /// Expiry Unix timestamp.
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Signs `claims` into a compact JWT.
///
/// # Errors
///
/// Returns an internal error if serialisation fails (which indicates a bug,
/// not bad input).
pub fn sign(claims: &Claims, secret: &[u8]) -> Result<String, McpError> {
    let header = Header {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };

    let header_json = serde_json::to_vec(&header)
        .map_err(|e| McpError::Internal(format!("failed to encode token header: {e}")))?;
    let claims_json = serde_json::to_vec(claims)
        .map_err(|e| McpError::Internal(format!("failed to encode token claims: {e}")))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| McpError::Internal(format!("failed to key HMAC: {e}")))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Verifies a compact JWT and returns its claims.
///
/// Expiry is not checked here; the token registry owns liveness.
///
/// # Errors
///
/// Returns [`McpError::InvalidToken`] on any structural or cryptographic
/// failure. The error deliberately carries no detail.
pub fn verify(token: &str, secret: &[u8]) -> Result<Claims, McpError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(McpError::InvalidToken);
    };

    let header_json = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| McpError::InvalidToken)?;
    let header: Header =
        serde_json::from_slice(&header_json).map_err(|_| McpError::InvalidToken)?;
    if header.alg != "HS256" {
        return Err(McpError::InvalidToken);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| McpError::InvalidToken)?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| McpError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    // verify_slice is constant-time.
    mac.verify_slice(&signature)
        .map_err(|_| McpError::InvalidToken)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| McpError::InvalidToken)?;
    serde_json::from_slice(&payload_json).map_err(|_| McpError::InvalidToken)
}
