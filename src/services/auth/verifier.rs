//! Token verification against the identity provider.
use std::sync::Arc;
use std::time::Duration;

use crate::services::auth::credential::BearerCredential;
use crate::services::auth::error::AuthError;
use crate::services::idp::{DecodedClaims, IdentityProvider, ProviderError};

/// Wraps the provider's verification primitive with syntactic pre-checks, a
/// bounded timeout and error classification.
///
/// No verification results are cached; tokens are short-lived and a cached
/// decision could outlive a revocation.
#[derive(Clone)]
pub struct TokenVerifier {
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl TokenVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn verify(&self, raw: &str) -> Result<DecodedClaims, AuthError> {
        // Malformed input never reaches the provider.
        let credential = BearerCredential::parse(raw)?;

        let call = self.provider.verify_token(credential.as_str());
        let result = tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            tracing::warn!(
                provider = self.provider.provider_name(),
                timeout_ms = self.timeout.as_millis() as u64,
                "token verification timed out"
            );
            AuthError::unavailable("identity provider timed out")
        })?;

        result.map_err(|err| {
            let classified = classify(&err);
            tracing::warn!(
                provider = self.provider.provider_name(),
                credential = %credential.fingerprint(),
                kind = classified.code(),
                error = %err,
                "token verification failed"
            );
            classified
        })
    }
}

fn classify(err: &ProviderError) -> AuthError {
    match err {
        ProviderError::InvalidToken(_) | ProviderError::UserNotFound => AuthError::InvalidToken,
        ProviderError::ExpiredToken => AuthError::ExpiredToken,
        ProviderError::Unavailable(_) | ProviderError::Rejected(_) => {
            AuthError::unavailable("identity provider unavailable")
        }
    }
}
