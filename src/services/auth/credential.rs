//! Bearer credential extraction and syntactic checks.
//!
//! Nothing here talks to the network: a credential that fails these checks is
//! rejected as `InvalidToken` before the identity provider is consulted.
use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::services::auth::error::AuthError;

/// Upper bound for a credential we are willing to forward to the provider.
pub const MAX_CREDENTIAL_LEN: usize = 8 * 1024;

/// Pull the raw bearer string out of the `Authorization` header.
///
/// Returns `None` when the header is absent, not valid ASCII, or uses another scheme.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim())
}

/// A syntactically well-formed compact JWS (`header.payload.signature`).
#[derive(Clone, PartialEq, Eq)]
pub struct BearerCredential(String);

impl BearerCredential {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_CREDENTIAL_LEN {
            return Err(AuthError::InvalidToken);
        }

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            return Err(AuthError::InvalidToken);
        }
        let base64url = |s: &str| {
            !s.is_empty()
                && s
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        };
        if !segments.iter().all(|s| base64url(s)) {
            return Err(AuthError::InvalidToken);
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl std::fmt::Debug for BearerCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BearerCredential")
            .field(&self.fingerprint())
            .finish()
    }
}

/// Short, non-reversible tag for correlating a credential across log lines.
pub fn fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    URL_SAFE_NO_PAD.encode(&digest[..9])
}
