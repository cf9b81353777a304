//! Authentication pipeline tests.
//!
//! Tests verify:
//! - Verified subjects with a profile assemble into identities that authorize correctly
//! - Verification failure, missing profile and inconsistency stay distinguishable
//! - Malformed credentials never reach the provider
//! - Timeouts surface as retryable `ServiceUnavailable`
//! - The debug bypass strategy is selected once and never in production

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use serde_json::json;

use sqes_gateway::config::{AuthSettings, ConfigError};
use sqes_gateway::services::auth::bypass::SYNTHETIC_SUBJECT_ID;
use sqes_gateway::services::auth::pipeline::{self, Authenticator};
use sqes_gateway::services::auth::{AuthError, Decision, DenyReason, Requirement, authorize};

use super::common::*;

fn pipeline_with(provider: FakeProvider, store: FakeStore) -> (Arc<FakeProvider>, Arc<FakeStore>, Arc<dyn Authenticator>) {
    let provider = Arc::new(provider);
    let store = Arc::new(store);
    let auth = pipeline::select(&settings(false), verified_pipeline(provider.clone(), store.clone()))
        .unwrap();
    (provider, store, auth)
}

// =============================================================================
// Happy path and authorization
// =============================================================================

#[tokio::test]
async fn test_qc_reader_scenario() {
    let (provider, store) = standard_backends();
    let (_, _, auth) = pipeline_with(provider, store);

    let identity = auth.authenticate(QC_TOKEN).await.unwrap();
    assert_eq!(identity.subject_id(), "u1");
    assert_eq!(identity.email(), Some("a@x.com"));
    assert!(identity.email_verified());
    assert!(identity.roles().contains("qc_reader"));

    assert_eq!(
        authorize(&identity, &Requirement::any_of(["qc_reader", "qc_admin"])),
        Decision::Allow
    );
    let denied = authorize(&identity, &Requirement::any_of(["qc_admin"]));
    assert!(matches!(
        &denied,
        Decision::Deny(reason) if reason.as_str() == "insufficient_scope"
    ));
}

#[tokio::test]
async fn test_profile_roles_win_over_token_roles() {
    let provider = FakeProvider::default().with_token(
        "mixed.token.sig",
        TokenOutcome::Claims(json!({"sub": "u7", "role": "admin"})),
    );
    let store = FakeStore::default().with_profile("u7", json!({"roles": ["user"]}));
    let (_, _, auth) = pipeline_with(provider, store);

    let identity = auth.authenticate("mixed.token.sig").await.unwrap();
    assert!(identity.roles().contains("user"));
    assert!(!identity.roles().contains("admin"));
    assert!(identity.holds("qc:read"));
}

#[tokio::test]
async fn test_disabled_profile_is_denied_except_own_status() {
    let (provider, store) = standard_backends();
    let (_, _, auth) = pipeline_with(provider, store);

    let identity = auth.authenticate(DISABLED_TOKEN).await.unwrap();
    assert!(identity.disabled());
    for requirement in [
        Requirement::Authenticated,
        Requirement::any_of(["admin"]),
        Requirement::all_of(["admin"]),
    ] {
        assert_eq!(
            authorize(&identity, &requirement),
            Decision::Deny(DenyReason::AccountDisabled)
        );
    }
    assert_eq!(authorize(&identity, &Requirement::OwnStatus), Decision::Allow);
}

// =============================================================================
// Failure kinds
// =============================================================================

#[tokio::test]
async fn test_missing_profile_is_profile_not_found() {
    let (provider, store) = standard_backends();
    let (_, store, auth) = pipeline_with(provider, store);

    let err = auth.authenticate(ORPHAN_TOKEN).await.unwrap_err();
    assert_eq!(err, AuthError::ProfileNotFound);
    assert!(!err.is_retryable());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failure_kinds_are_distinct() {
    let provider = FakeProvider::default()
        .with_token(FORGED_TOKEN, TokenOutcome::Invalid)
        .with_token(EXPIRED_TOKEN, TokenOutcome::Expired)
        .with_token(ORPHAN_TOKEN, claims_for("orphan-1", "n@x.com"))
        .with_token("mismatch.token.sig", claims_for("u9", "m@x.com"));
    let store = FakeStore::default().with_profile("u9", json!({"id": "someone-else"}));
    let (_, store, auth) = pipeline_with(provider, store);

    let forged = auth.authenticate(FORGED_TOKEN).await.unwrap_err();
    let expired = auth.authenticate(EXPIRED_TOKEN).await.unwrap_err();
    let orphan = auth.authenticate(ORPHAN_TOKEN).await.unwrap_err();
    let mismatch = auth.authenticate("mismatch.token.sig").await.unwrap_err();

    assert_eq!(forged, AuthError::InvalidToken);
    assert_eq!(expired, AuthError::ExpiredToken);
    assert_eq!(orphan, AuthError::ProfileNotFound);
    assert!(matches!(mismatch, AuthError::InconsistentIdentity(_)));

    // Verification failures stop before the profile store.
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_malformed_credential_skips_provider() {
    let (provider, store) = standard_backends();
    let (provider, _, auth) = pipeline_with(provider, store);

    for raw in ["", "not-a-jwt", "a.b", "a..c", "a.b.c.d", "a.b c.d"] {
        assert_eq!(
            auth.authenticate(raw).await.unwrap_err(),
            AuthError::InvalidToken,
            "{raw:?}"
        );
    }
    assert_eq!(provider.verify_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_profile_is_inconsistent_identity() {
    let provider = FakeProvider::default().with_token(QC_TOKEN, claims_for("u1", "a@x.com"));
    let store = FakeStore::default().with_profile("u1", json!({"roles": "qc_reader"}));
    let (_, _, auth) = pipeline_with(provider, store);

    assert_eq!(
        auth.authenticate(QC_TOKEN).await.unwrap_err(),
        AuthError::InconsistentIdentity("profile document")
    );
}

#[tokio::test]
async fn test_backend_outages_are_service_unavailable() {
    let provider = FakeProvider::default().with_token("down.token.sig", TokenOutcome::Unavailable);
    let (_, _, auth) = pipeline_with(provider, FakeStore::default());
    let err = auth.authenticate("down.token.sig").await.unwrap_err();
    assert!(err.is_retryable());

    let (provider, _) = standard_backends();
    let store = FakeStore {
        unavailable: true,
        ..Default::default()
    };
    let (_, _, auth) = pipeline_with(provider, store);
    let err = auth.authenticate(QC_TOKEN).await.unwrap_err();
    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let provider = FakeProvider {
        verify_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    }
    .with_token(QC_TOKEN, claims_for("u1", "a@x.com"));
    let (_, _, auth) = pipeline_with(provider, FakeStore::default());

    let started = Instant::now();
    let err = auth.authenticate(QC_TOKEN).await.unwrap_err();
    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_slow_profile_store_times_out() {
    let (provider, store) = standard_backends();
    let store = FakeStore {
        delay: Some(Duration::from_secs(5)),
        ..store
    };
    let (provider, store, auth) = pipeline_with(provider, store);

    let started = Instant::now();
    let err = auth.authenticate(QC_TOKEN).await.unwrap_err();
    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(provider.verify_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Debug bypass strategy
// =============================================================================

#[tokio::test]
async fn test_bypass_returns_synthetic_identity() {
    let (provider, store) = standard_backends();
    let provider = Arc::new(provider);
    let auth = pipeline::select(
        &settings(true),
        verified_pipeline(provider.clone(), Arc::new(store)),
    )
    .unwrap();
    assert_eq!(auth.mode(), "debug-bypass");

    let identity = auth.authenticate(BYPASS_TOKEN).await.unwrap();
    assert_eq!(identity.subject_id(), SYNTHETIC_SUBJECT_ID);
    assert!(identity.is_synthetic());
    assert_eq!(provider.verify_calls.load(Ordering::SeqCst), 0);

    // Real credentials still go through verification.
    let identity = auth.authenticate(QC_TOKEN).await.unwrap();
    assert_eq!(identity.subject_id(), "u1");
    assert_eq!(provider.verify_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bypass_never_selected_in_production() {
    let (provider, store) = standard_backends();
    let settings = AuthSettings {
        is_production: true,
        ..settings(true)
    };
    let result = pipeline::select(
        &settings,
        verified_pipeline(Arc::new(provider), Arc::new(store)),
    );
    assert_eq!(
        result.err(),
        Some(ConfigError::Insecure("DEBUG_BYPASS_ENABLED"))
    );
}

#[tokio::test]
async fn test_verified_mode_ignores_bypass_token() {
    let (provider, store) = standard_backends();
    let (_, _, auth) = pipeline_with(provider, store);
    assert_eq!(auth.mode(), "verified");
    // Not a three-segment token, so rejected syntactically.
    assert_eq!(
        auth.authenticate(BYPASS_TOKEN).await.unwrap_err(),
        AuthError::InvalidToken
    );
}
