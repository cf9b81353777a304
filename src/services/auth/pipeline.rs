//! Per-request authentication pipeline.
//!
//! The strategy is selected once at startup:
//! - `VerifiedPipeline`: credential → verify → resolve profile → assemble
//! - `BypassPipeline`: the debug bypass in front of a `VerifiedPipeline`
//!
//! Stages run strictly in sequence; dropping the returned future (client
//! disconnect) cancels any in-flight provider/store call.
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::{AuthSettings, ConfigError};
use crate::services::auth::bypass::DebugBypass;
use crate::services::auth::error::AuthError;
use crate::services::auth::identity::{self, Identity};
use crate::services::auth::profile::ProfileResolver;
use crate::services::auth::verifier::TokenVerifier;

#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    /// Human-readable strategy name, logged at startup.
    fn mode(&self) -> &'static str;

    async fn authenticate(&self, credential: &str) -> Result<Identity, AuthError>;
}

#[derive(Clone)]
pub struct VerifiedPipeline {
    verifier: TokenVerifier,
    resolver: ProfileResolver,
}

impl VerifiedPipeline {
    pub fn new(verifier: TokenVerifier, resolver: ProfileResolver) -> Self {
        Self { verifier, resolver }
    }
}

#[async_trait]
impl Authenticator for VerifiedPipeline {
    fn mode(&self) -> &'static str {
        "verified"
    }

    async fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        let claims = self.verifier.verify(credential).await?;

        let subject_id = claims
            .get("sub")
            .and_then(Value::as_str)
            .ok_or(AuthError::InconsistentIdentity("token subject"))?;

        let profile = self.resolver.resolve(subject_id).await?;
        let identity = identity::assemble(&claims, &profile).inspect_err(|err| {
            tracing::warn!(subject_id, error = %err, "identity assembly failed");
        })?;

        tracing::debug!(
            subject_id = identity.subject_id(),
            roles = ?identity.roles(),
            disabled = identity.disabled(),
            "identity assembled"
        );
        Ok(identity)
    }
}

pub struct BypassPipeline {
    bypass: DebugBypass,
    inner: VerifiedPipeline,
}

#[async_trait]
impl Authenticator for BypassPipeline {
    fn mode(&self) -> &'static str {
        "debug-bypass"
    }

    async fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.bypass.maybe_bypass(credential) {
            tracing::warn!(
                subject_id = identity.subject_id(),
                "!!! SECURITY WARNING: request authenticated through debug bypass !!!"
            );
            return Ok(identity);
        }
        self.inner.authenticate(credential).await
    }
}

/// Pick the pipeline strategy for the process lifetime.
pub fn select(
    settings: &AuthSettings,
    verified: VerifiedPipeline,
) -> Result<Arc<dyn Authenticator>, ConfigError> {
    let authenticator: Arc<dyn Authenticator> = match DebugBypass::from_settings(settings)? {
        Some(bypass) => Arc::new(BypassPipeline {
            bypass,
            inner: verified,
        }),
        None => Arc::new(verified),
    };

    tracing::info!(mode = authenticator.mode(), "authentication pipeline selected");
    Ok(authenticator)
}
