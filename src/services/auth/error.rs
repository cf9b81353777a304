//! Error taxonomy of the identity & access layer.
//!
//! Every failure inside the pipeline is re-classified into one of these kinds;
//! provider, store and database errors never leave this layer raw.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    ExpiredToken,

    /// Provider or store unreachable, erroring transiently, or timed out.
    /// The only kind a caller may reasonably retry.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Verified subject without a profile document (incomplete registration).
    #[error("profile not found")]
    ProfileNotFound,

    #[error("inconsistent identity: {0}")]
    InconsistentIdentity(&'static str),

    #[error("account disabled")]
    AccountDisabled,

    #[error("insufficient scope")]
    InsufficientScope { required: Option<String> },

    #[error("target subject not found")]
    TargetNotFound,
}

impl AuthError {
    /// Stable machine-readable code used in responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "token_expired",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
            AuthError::ProfileNotFound => "profile_not_found",
            AuthError::InconsistentIdentity(_) => "inconsistent_identity",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::InsufficientScope { .. } => "insufficient_scope",
            AuthError::TargetNotFound => "target_not_found",
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        AuthError::ServiceUnavailable(detail.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::ServiceUnavailable(_))
    }
}
