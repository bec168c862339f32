//! Integration tests for the token lifecycle.
//!
//! Covers the full state machine: issued → valid → (expired | revoked),
//! lifetime bounds, lazy garbage collection, and revoke idempotence.

use storefront_mcp::auth::{Principal, TokenManager};
use storefront_mcp::config::{AuthConfig, UserConfig};
use storefront_mcp::error::McpError;

const MIN_TTL: i64 = 3600;
const MAX_TTL: i64 = 86400;

fn manager() -> TokenManager {
    TokenManager::from_config(&AuthConfig {
        required: true,
        secret: "integration-test-secret".to_string(),
        min_token_ttl_secs: MIN_TTL,
        max_token_ttl_secs: MAX_TTL,
        users: vec![
            UserConfig {
                username: "alice".to_string(),
                password: "wonderland".to_string(),
                admin: false,
            },
            UserConfig {
                username: "ops".to_string(),
                password: "s3cret".to_string(),
                admin: true,
            },
        ],
    })
}

#[test]
fn round_trip_issue_validate_revoke() {
    let mgr = manager();

    let issued = mgr.issue("alice", 3600).unwrap();
    let principal = mgr.validate(&issued.token).unwrap();
    assert_eq!(
        principal,
        Principal::User {
            name: "alice".to_string(),
            admin: false
        }
    );

    mgr.revoke(&issued.jti).unwrap();
    assert!(matches!(
        mgr.validate(&issued.token),
        Err(McpError::InvalidToken)
    ));
}

#[test]
fn expiry_invalidates_without_revoke() {
    let mgr = manager();
    let issued = mgr.issue_at("alice", MIN_TTL, 1_000_000).unwrap();

    assert!(mgr.validate_at(&issued.token, 1_000_000 + MIN_TTL - 1).is_ok());
    assert!(mgr.validate_at(&issued.token, 1_000_000 + MIN_TTL).is_err());
}

#[test]
fn lifetime_bounds_are_inclusive() {
    let mgr = manager();

    assert!(matches!(
        mgr.issue("alice", 100),
        Err(McpError::InvalidExpiration { .. })
    ));
    assert!(matches!(
        mgr.issue("alice", 999_999),
        Err(McpError::InvalidExpiration { .. })
    ));

    assert!(mgr.issue("alice", MIN_TTL).is_ok());
    assert!(mgr.issue("alice", MAX_TTL).is_ok());
}

#[test]
fn invalid_expiration_reports_bounds() {
    let mgr = manager();
    let Err(McpError::InvalidExpiration { requested, min, max }) = mgr.issue("alice", 10) else {
        panic!("expected InvalidExpiration");
    };
    assert_eq!(requested, 10);
    assert_eq!(min, MIN_TTL);
    assert_eq!(max, MAX_TTL);
}

#[test]
fn double_revoke_is_equivalent_to_single() {
    let mgr = manager();
    let issued = mgr.issue("alice", 3600).unwrap();

    mgr.revoke(&issued.jti).unwrap();
    let after_first: Vec<_> = mgr.list(Some("alice"));
    mgr.revoke(&issued.jti).unwrap();
    let after_second: Vec<_> = mgr.list(Some("alice"));

    assert_eq!(after_first.len(), after_second.len());
    assert!(after_second[0].revoked);
}

#[test]
fn validation_failures_are_indistinguishable() {
    let mgr = manager();
    let issued = mgr.issue("alice", 3600).unwrap();
    mgr.revoke(&issued.jti).unwrap();

    let revoked = mgr.validate(&issued.token).unwrap_err().to_string();
    let garbage = mgr.validate("a.b.c").unwrap_err().to_string();
    let foreign = {
        let other = TokenManager::from_config(&AuthConfig {
            secret: "another-secret".to_string(),
            ..AuthConfig::default()
        });
        let t = other.issue("alice", 3600).unwrap();
        mgr.validate(&t.token).unwrap_err().to_string()
    };

    assert_eq!(revoked, garbage);
    assert_eq!(revoked, foreign);
}

#[test]
fn listing_sweeps_expired_and_orphaned_records() {
    let mgr = manager();
    mgr.issue_at("alice", MIN_TTL, 1_000_000).unwrap(); // will expire
    mgr.issue_at("ghost", MIN_TTL, 1_000_000).unwrap(); // orphan: not configured
    let live = mgr.issue_at("ops", MAX_TTL, 1_000_000).unwrap();

    let records = mgr.list_at(None, 1_000_000 + MIN_TTL + 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].jti, live.jti);
    assert_eq!(records[0].user_id, "ops");
}

#[test]
fn distinct_tokens_get_distinct_jtis() {
    let mgr = manager();
    let a = mgr.issue("alice", 3600).unwrap();
    let b = mgr.issue("alice", 3600).unwrap();
    assert_ne!(a.jti, b.jti);
    assert_ne!(a.token, b.token);
}

#[test]
fn expires_at_reflects_requested_ttl() {
    let mgr = manager();
    let issued = mgr.issue_at("alice", 7200, 1_000_000).unwrap();
    assert_eq!(issued.expires_at, 1_007_200);

    let record = mgr.get(&issued.jti).unwrap();
    assert_eq!(record.issued_at, 1_000_000);
    assert_eq!(record.expires_at, 1_007_200);
    assert!(!record.revoked);
}
