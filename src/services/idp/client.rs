//! Identity provider interface used by the token verifier and the claims mutator.
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Claim set decoded from a provider-verified credential, as issued.
pub type DecodedClaims = Map<String, Value>;

/// Provider-level errors.
///
/// Kept independent from `AuthError` so the auth layer decides how each one is
/// classified (terminal rejection vs retryable unavailability).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("token rejected: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    ExpiredToken,
    #[error("user not found")]
    UserNotFound,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Uid(String),
    Email(String),
}

/// Account record held by the provider (only the parts the gateway needs).
#[derive(Debug, Clone, Default)]
pub struct UserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub disabled: bool,
    pub custom_claims: Map<String, Value>,
}

/// Verification + custom-claim primitives of the external identity provider.
///
/// Implementations hold long-lived client handles and must be cheap to share
/// (`Arc<dyn IdentityProvider>`).
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    // Returns the provider name (for logging).
    fn provider_name(&self) -> &'static str;

    // Validate signature/expiry of a raw credential and return its decoded claims.
    async fn verify_token(&self, raw: &str) -> Result<DecodedClaims, ProviderError>;

    // Fetch an account by uid or email. `Ok(None)` when the account does not exist.
    async fn lookup_user(&self, lookup: &UserLookup) -> Result<Option<UserRecord>, ProviderError>;

    // Replace the custom-claim object stored for `subject_id`.
    async fn set_custom_claims(
        &self,
        subject_id: &str,
        claims: &Map<String, Value>,
    ) -> Result<(), ProviderError>;
}
