//! Privileged write path for role claims at the identity provider.
//!
//! Order of operations:
//! 1. authorize the caller (`claims:manage`); a denial performs no write at all
//! 2. look up the target and its current roles
//! 3. audit record → `pending`
//! 4. write the new custom claims
//! 5. audit record → `committed`, or `failed` when the provider definitively
//!    rejected the write; a timed-out or unreachable write leaves it `pending`
//!
//! The profile document is not touched; the two stores are reconciled lazily and
//! no read-after-write consistency across them is promised.
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::services::auth::audit::{AuditEntry, AuditSink};
use crate::services::auth::error::AuthError;
use crate::services::auth::identity::Identity;
use crate::services::auth::policy::{self, Requirement};
use crate::services::auth::scopes;
use crate::services::idp::{IdentityProvider, ProviderError, UserLookup};

pub const MAX_ROLE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role name: {0:?}")]
pub struct InvalidRole(pub String);

/// A validated, de-duplicated set of role names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn parse<I, S>(roles: I) -> Result<Self, InvalidRole>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        roles
            .into_iter()
            .map(|r| {
                let r = r.as_ref().trim();
                let valid = !r.is_empty()
                    && r.len() <= MAX_ROLE_LEN
                    && r.bytes().all(|b| {
                        b.is_ascii_lowercase()
                            || b.is_ascii_digit()
                            || matches!(b, b'_' | b':' | b'-')
                    });
                if valid {
                    Ok(r.to_string())
                } else {
                    Err(InvalidRole(r.to_string()))
                }
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone)]
pub struct ClaimsChange {
    pub audit_id: Uuid,
    pub target_subject: String,
    pub old_roles: Vec<String>,
    pub new_roles: Vec<String>,
}

pub struct ClaimsMutator {
    provider: Arc<dyn IdentityProvider>,
    audit: Arc<dyn AuditSink>,
    requirement: Requirement,
    timeout: Duration,
}

impl ClaimsMutator {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        audit: Arc<dyn AuditSink>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            audit,
            requirement: Requirement::any_of([scopes::CLAIMS_MANAGE]),
            timeout,
        }
    }

    pub async fn set_claims(
        &self,
        caller: &Identity,
        target: &UserLookup,
        new_roles: &RoleSet,
    ) -> Result<ClaimsChange, AuthError> {
        if let Err(err) = policy::authorize(caller, &self.requirement).into_result() {
            tracing::warn!(
                target: "audit",
                caller = caller.subject_id(),
                lookup = ?target,
                reason = err.code(),
                "claims mutation denied"
            );
            return Err(match err {
                AuthError::AccountDisabled => AuthError::InsufficientScope {
                    required: Some(scopes::CLAIMS_MANAGE.to_string()),
                },
                other => other,
            });
        }

        let record = self
            .call(self.provider.lookup_user(target))
            .await?
            .ok_or(AuthError::TargetNotFound)?;

        let old_roles = roles_from_claims(&record.custom_claims);
        let new_roles = new_roles.to_vec();

        let entry = AuditEntry {
            caller_subject: caller.subject_id().to_string(),
            target_subject: record.uid.clone(),
            old_roles: old_roles.clone(),
            new_roles: new_roles.clone(),
            at: Utc::now(),
        };

        // No audit record, no write.
        let audit_id = self.audit.begin(&entry).await.map_err(|e| {
            tracing::error!(target: "audit", error = %e, "cannot record pending claims mutation");
            AuthError::unavailable("audit log unavailable")
        })?;

        let claims = merged_claims(record.custom_claims, &new_roles);
        let written = tokio::time::timeout(
            self.timeout,
            self.provider.set_custom_claims(&record.uid, &claims),
        )
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err @ (ProviderError::UserNotFound | ProviderError::Rejected(_)))) => {
                // Definitive rejection: nothing was written.
                if let Err(e) = self.audit.fail(audit_id, &err.to_string()).await {
                    tracing::error!(
                        target: "audit",
                        %audit_id,
                        error = %e,
                        "cannot mark claims mutation as failed; record stays pending"
                    );
                }
                return Err(classify(err));
            }
            other => {
                // Timed out or transport failure: the provider may have applied the write.
                let error = match other {
                    Ok(Err(e)) => e.to_string(),
                    _ => "timed out".to_string(),
                };
                tracing::error!(
                    target: "audit",
                    %audit_id,
                    target_subject = %record.uid,
                    %error,
                    "claims write outcome unknown; record stays pending"
                );
                return Err(AuthError::unavailable("identity provider unavailable"));
            }
        }

        if let Err(e) = self.audit.commit(audit_id).await {
            tracing::error!(
                target: "audit",
                %audit_id,
                target_subject = %record.uid,
                error = %e,
                "claims written but audit record could not be committed; record stays pending"
            );
            return Err(AuthError::unavailable("audit log unavailable"));
        }

        tracing::info!(
            target: "audit",
            %audit_id,
            caller = %entry.caller_subject,
            target_subject = %entry.target_subject,
            old_roles = ?entry.old_roles,
            new_roles = ?entry.new_roles,
            "claims mutation committed"
        );

        Ok(ClaimsChange {
            audit_id,
            target_subject: record.uid,
            old_roles,
            new_roles,
        })
    }

    async fn call<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => Err(AuthError::unavailable("identity provider timed out")),
            Ok(result) => result.map_err(classify),
        }
    }
}

fn classify(err: ProviderError) -> AuthError {
    match err {
        ProviderError::UserNotFound => AuthError::TargetNotFound,
        e => {
            tracing::error!(error = %e, "identity provider admin call failed");
            AuthError::unavailable("identity provider unavailable")
        }
    }
}

/// Current roles stored in custom claims (`roles` array, else legacy `role`).
fn roles_from_claims(claims: &Map<String, Value>) -> Vec<String> {
    match (claims.get("roles"), claims.get("role")) {
        (Some(Value::Array(items)), _) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        (_, Some(Value::String(role))) => vec![role.clone()],
        _ => Vec::new(),
    }
}

/// Existing custom claims with `roles` (and the legacy single `role`) replaced.
fn merged_claims(mut claims: Map<String, Value>, roles: &[String]) -> Map<String, Value> {
    claims.insert(
        "roles".to_string(),
        Value::Array(roles.iter().cloned().map(Value::String).collect()),
    );
    match roles.first() {
        Some(first) => {
            claims.insert("role".to_string(), Value::String(first.clone()));
        }
        None => {
            claims.remove("role");
        }
    }
    claims
}
