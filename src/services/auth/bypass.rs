//! Development-only debug bypass.
//!
//! Activation is decided once, at startup, from `AuthSettings`:
//! - flag unset                      → no bypass
//! - flag set, non-production        → bypass active (logged loudly)
//! - flag set, production            → `ConfigError::Insecure`, process must not start
//!
//! Per request it is a constant-time comparison of the presented credential with
//! the configured bypass token.
use std::collections::BTreeSet;

use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

use crate::config::{AuthSettings, ConfigError};
use crate::services::auth::identity::{Identity, SYNTHETIC_SUBJECT_PREFIX};
use crate::services::auth::scopes;

pub const SYNTHETIC_SUBJECT_ID: &str = "debug:synthetic-admin";

#[derive(Clone)]
pub struct DebugBypass {
    token: String,
}

impl std::fmt::Debug for DebugBypass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugBypass").finish_non_exhaustive()
    }
}

impl DebugBypass {
    /// `Ok(None)` when the bypass is off; an error when the settings would enable it unsafely.
    pub fn from_settings(settings: &AuthSettings) -> Result<Option<Self>, ConfigError> {
        settings.validate()?;

        if !settings.debug_bypass_enabled {
            return Ok(None);
        }
        // validate() guarantees both of these; checked again at the trust boundary.
        if settings.is_production {
            return Err(ConfigError::Insecure("DEBUG_BYPASS_ENABLED"));
        }
        let token = settings
            .debug_bypass_token
            .clone()
            .ok_or(ConfigError::Missing("DEBUG_BYPASS_TOKEN"))?;

        tracing::warn!(
            subject_id = SYNTHETIC_SUBJECT_ID,
            "!!! SECURITY WARNING: debug bypass is ACTIVE; requests presenting the bypass token skip verification !!!"
        );

        Ok(Some(Self { token }))
    }

    /// The synthetic identity when `credential` is the bypass token.
    pub fn maybe_bypass(&self, credential: &str) -> Option<Identity> {
        let matches: bool = credential.as_bytes().ct_eq(self.token.as_bytes()).into();
        matches.then(synthetic_identity)
    }
}

/// Fixed identity handed out by the bypass. Its subject id carries the
/// synthetic prefix, which provider-issued subjects can never have.
pub fn synthetic_identity() -> Identity {
    debug_assert!(SYNTHETIC_SUBJECT_ID.starts_with(SYNTHETIC_SUBJECT_PREFIX));

    let roles: BTreeSet<String> = [scopes::ROLE_ADMIN.to_string()].into_iter().collect();
    let permissions = scopes::derive_permissions(&roles);

    let mut raw_claims = Map::new();
    raw_claims.insert("sub".into(), Value::String(SYNTHETIC_SUBJECT_ID.into()));
    raw_claims.insert("synthetic".into(), Value::Bool(true));

    Identity {
        subject_id: SYNTHETIC_SUBJECT_ID.to_string(),
        email: Some("debug@sqes.local".to_string()),
        email_verified: true,
        display_name: Some("Debug User".to_string()),
        photo_url: None,
        username: Some("debuguser".to_string()),
        roles,
        permissions,
        disabled: false,
        created_at: None,
        last_login: None,
        raw_claims,
    }
}
