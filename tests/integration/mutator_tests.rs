//! Claims mutator tests.
//!
//! Tests verify:
//! - Denied callers cause zero provider writes and zero audit records
//! - Successful mutations merge claims and commit their audit record
//! - Audit failures block or fail the mutation, never silently succeed

use std::sync::Arc;
use std::sync::atomic::Ordering;

use serde_json::json;

use sqes_gateway::services::auth::bypass::synthetic_identity;
use sqes_gateway::services::auth::{
    AuditStatus, AuthError, Authenticator, ClaimsMutator, Identity, RoleSet,
};
use sqes_gateway::services::idp::UserLookup;

use super::common::*;

async fn identity_for(token: &str) -> Identity {
    let (provider, store) = standard_backends();
    let pipeline = verified_pipeline(Arc::new(provider), Arc::new(store));
    pipeline.authenticate(token).await.unwrap()
}

fn mutator(provider: FakeProvider, audit: FakeAudit) -> (Arc<FakeProvider>, Arc<FakeAudit>, ClaimsMutator) {
    let provider = Arc::new(provider);
    let audit = Arc::new(audit);
    let mutator = ClaimsMutator::new(provider.clone(), audit.clone(), TIMEOUT);
    (provider, audit, mutator)
}

fn roles(items: &[&str]) -> RoleSet {
    RoleSet::parse(items.iter().copied()).unwrap()
}

fn target() -> UserLookup {
    UserLookup::Uid("target-1".to_string())
}

// =============================================================================
// Denial
// =============================================================================

#[tokio::test]
async fn test_viewer_cannot_write_claims() {
    let viewer = identity_for(VIEWER_TOKEN).await;
    let (provider, _) = standard_backends();
    let (provider, audit, mutator) = mutator(provider, FakeAudit::default());

    let err = mutator
        .set_claims(&viewer, &target(), &roles(&["admin"]))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AuthError::InsufficientScope {
            required: Some("claims:manage".to_string())
        }
    );
    assert_eq!(provider.write_count(), 0);
    assert_eq!(provider.lookup_calls.load(Ordering::SeqCst), 0);
    assert!(audit.statuses().is_empty());
}

#[tokio::test]
async fn test_disabled_admin_cannot_write_claims() {
    let disabled = identity_for(DISABLED_TOKEN).await;
    let (provider, _) = standard_backends();
    let (provider, audit, mutator) = mutator(provider, FakeAudit::default());

    let err = mutator
        .set_claims(&disabled, &target(), &roles(&["user"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InsufficientScope { .. }));
    assert_eq!(provider.write_count(), 0);
    assert!(audit.statuses().is_empty());
}

// =============================================================================
// Successful mutation
// =============================================================================

#[tokio::test]
async fn test_admin_sets_roles_and_commits_audit() {
    let admin = identity_for(ADMIN_TOKEN).await;
    let (provider, _) = standard_backends();
    let (provider, audit, mutator) = mutator(provider, FakeAudit::default());

    let change = mutator
        .set_claims(&admin, &target(), &roles(&["manager"]))
        .await
        .unwrap();

    assert_eq!(change.target_subject, "target-1");
    assert_eq!(change.old_roles, vec!["user"]);
    assert_eq!(change.new_roles, vec!["manager"]);

    let (subject, claims) = provider.last_write().unwrap();
    assert_eq!(subject, "target-1");
    assert_eq!(
        serde_json::Value::Object(claims),
        json!({"tenant": "bmkg", "role": "manager", "roles": ["manager"]})
    );

    let records = audit.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    let (id, entry, status, _) = &records[0];
    assert_eq!(*id, change.audit_id);
    assert_eq!(*status, AuditStatus::Committed);
    assert_eq!(entry.caller_subject, "admin-1");
    assert_eq!(entry.old_roles, vec!["user"]);
    assert_eq!(entry.new_roles, vec!["manager"]);
}

#[tokio::test]
async fn test_target_resolved_by_email() {
    let (provider, _) = standard_backends();
    let (provider, _, mutator) = mutator(provider, FakeAudit::default());

    let change = mutator
        .set_claims(
            &synthetic_identity(),
            &UserLookup::Email("target@x.com".to_string()),
            &roles(&["qc_reader", "user"]),
        )
        .await
        .unwrap();
    assert_eq!(change.target_subject, "target-1");
    assert_eq!(provider.write_count(), 1);
}

#[tokio::test]
async fn test_unknown_target_is_target_not_found() {
    let (provider, _) = standard_backends();
    let (provider, audit, mutator) = mutator(provider, FakeAudit::default());

    let err = mutator
        .set_claims(
            &synthetic_identity(),
            &UserLookup::Uid("nobody".to_string()),
            &roles(&["user"]),
        )
        .await
        .unwrap_err();
    assert_eq!(err, AuthError::TargetNotFound);
    assert_eq!(provider.write_count(), 0);
    assert!(audit.statuses().is_empty());
}

// =============================================================================
// Audit failure modes
// =============================================================================

#[tokio::test]
async fn test_no_pending_record_means_no_write() {
    let (provider, _) = standard_backends();
    let audit = FakeAudit {
        fail_begin: true,
        ..Default::default()
    };
    let (provider, _, mutator) = mutator(provider, audit);

    let err = mutator
        .set_claims(&synthetic_identity(), &target(), &roles(&["user"]))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(provider.write_count(), 0);
}

#[tokio::test]
async fn test_rejected_write_marks_audit_failed() {
    let (provider, _) = standard_backends();
    let provider = FakeProvider {
        fail_writes: true,
        ..provider
    };
    let (_, audit, mutator) = mutator(provider, FakeAudit::default());

    let err = mutator
        .set_claims(&synthetic_identity(), &target(), &roles(&["user"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
    assert_eq!(audit.statuses(), vec![AuditStatus::Failed]);
    let records = audit.records.lock().unwrap();
    assert!(records[0].3.as_deref().unwrap().contains("INVALID_CLAIMS"));
}

#[tokio::test]
async fn test_unreachable_write_leaves_audit_pending() {
    let (provider, _) = standard_backends();
    let provider = FakeProvider {
        writes_unavailable: true,
        ..provider
    };
    let (_, audit, mutator) = mutator(provider, FakeAudit::default());

    let err = mutator
        .set_claims(&synthetic_identity(), &target(), &roles(&["user"]))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(audit.statuses(), vec![AuditStatus::Pending]);
}

#[tokio::test]
async fn test_write_applied_then_timed_out_leaves_audit_pending() {
    let (provider, _) = standard_backends();
    let provider = FakeProvider {
        write_delay: Some(TIMEOUT * 5),
        ..provider
    };
    let (provider, audit, mutator) = mutator(provider, FakeAudit::default());

    let started = std::time::Instant::now();
    let err = mutator
        .set_claims(&synthetic_identity(), &target(), &roles(&["manager"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
    assert!(started.elapsed() < TIMEOUT * 4);
    // The provider holds the new claims; the record must not claim otherwise.
    assert_eq!(provider.write_count(), 1);
    assert_eq!(audit.statuses(), vec![AuditStatus::Pending]);
}

#[tokio::test]
async fn test_uncommitted_audit_is_reported_as_failure() {
    let (provider, _) = standard_backends();
    let audit = FakeAudit {
        fail_commit: true,
        ..Default::default()
    };
    let (provider, audit, mutator) = mutator(provider, audit);

    let err = mutator
        .set_claims(&synthetic_identity(), &target(), &roles(&["user"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ServiceUnavailable(_)));
    // The write happened; the pending record is the trace of it.
    assert_eq!(provider.write_count(), 1);
    assert_eq!(audit.statuses(), vec![AuditStatus::Pending]);
}
