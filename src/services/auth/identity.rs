//! Assembled identity and the merge of token claims with profile data.
//!
//! An `Identity` is built once per request and never mutated or shared across
//! requests. `subject_id` is the only join key between the two sources.
use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::services::auth::error::AuthError;
use crate::services::auth::profile::Profile;
use crate::services::auth::scopes;
use crate::services::idp::DecodedClaims;

/// Prefix reserved for synthetic (debug bypass) subjects. Verified tokens
/// carrying it are rejected.
pub const SYNTHETIC_SUBJECT_PREFIX: &str = "debug:";

#[derive(Debug, Clone)]
pub struct Identity {
    pub(crate) subject_id: String,
    pub(crate) email: Option<String>,
    pub(crate) email_verified: bool,
    pub(crate) display_name: Option<String>,
    pub(crate) photo_url: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) roles: BTreeSet<String>,
    pub(crate) permissions: BTreeSet<String>,
    pub(crate) disabled: bool,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) last_login: Option<DateTime<Utc>>,
    pub(crate) raw_claims: Map<String, Value>,
}

impl Identity {
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn email_verified(&self) -> bool {
        self.email_verified
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    /// Claims as issued by the provider. Audit/debug only.
    pub fn raw_claims(&self) -> &Map<String, Value> {
        &self.raw_claims
    }

    /// `true` for `role` or `permission` entries held by this identity.
    pub fn holds(&self, entry: &str) -> bool {
        self.roles.contains(entry) || self.permissions.contains(entry)
    }

    pub fn is_synthetic(&self) -> bool {
        self.subject_id.starts_with(SYNTHETIC_SUBJECT_PREFIX)
    }
}

/// Typed view of the provider claim set. Extra claims are allowed; a known
/// claim with the wrong shape is not.
#[derive(Debug, Deserialize)]
struct TokenClaimSet {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
    username: Option<String>,
    role: Option<String>,
    roles: Option<Vec<String>>,
    permissions: Option<Vec<String>>,
    auth_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDocument {
    #[serde(alias = "uid")]
    id: Option<String>,
    role: Option<String>,
    roles: Option<Vec<String>>,
    permissions: Option<Vec<String>>,
    disabled: Option<bool>,
    username: Option<String>,
    profile_picture: Option<String>,
    created_at: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
}

fn role_list(roles: Option<Vec<String>>, legacy: Option<String>) -> Option<Vec<String>> {
    roles.or_else(|| legacy.map(|r| vec![r]))
}

fn to_set(entries: Vec<String>, field: &'static str) -> Result<BTreeSet<String>, AuthError> {
    if entries.iter().any(|e| e.trim().is_empty()) {
        return Err(AuthError::InconsistentIdentity(field));
    }
    Ok(entries.into_iter().collect())
}

fn valid_subject(subject: &str) -> bool {
    !subject.is_empty()
        && subject.trim() == subject
        && !subject.starts_with(SYNTHETIC_SUBJECT_PREFIX)
        && !subject.chars().any(char::is_control)
}

/// Merge verified token claims and the subject's profile into one identity.
///
/// - `roles`/`permissions`: profile first, token claims as fallback, empty otherwise;
///   permissions additionally include the scopes derived from the roles
/// - `email`/`email_verified`: token claims only
/// - `disabled` is carried through; enforcement belongs to the policy engine
pub fn assemble(claims: &DecodedClaims, profile: &Profile) -> Result<Identity, AuthError> {
    let token: TokenClaimSet = serde_json::from_value(Value::Object(claims.clone()))
        .map_err(|_| AuthError::InconsistentIdentity("token claims"))?;

    if !valid_subject(&token.sub) {
        return Err(AuthError::InconsistentIdentity("token subject"));
    }
    if profile.subject_id() != token.sub {
        return Err(AuthError::InconsistentIdentity("profile key"));
    }

    let doc: ProfileDocument = serde_json::from_value(Value::Object(profile.document().clone()))
        .map_err(|_| AuthError::InconsistentIdentity("profile document"))?;

    if let Some(id) = doc.id.as_deref()
        && id != token.sub
    {
        return Err(AuthError::InconsistentIdentity("profile subject"));
    }

    let roles = role_list(doc.roles, doc.role)
        .or_else(|| role_list(token.roles, token.role))
        .unwrap_or_default();
    let roles = to_set(roles, "roles")?;

    let stored_permissions = doc.permissions.or(token.permissions).unwrap_or_default();
    let mut permissions = to_set(stored_permissions, "permissions")?;
    permissions.extend(scopes::derive_permissions(&roles));

    let last_login = doc.last_login.or_else(|| {
        token
            .auth_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    });

    Ok(Identity {
        subject_id: token.sub,
        email: token.email,
        email_verified: token.email_verified.unwrap_or(false),
        display_name: token.name,
        photo_url: token.picture.or(doc.profile_picture),
        username: doc.username.or(token.username),
        roles,
        permissions,
        disabled: doc.disabled.unwrap_or(false),
        created_at: doc.created_at,
        last_login,
        raw_claims: claims.clone(),
    })
}
