//! OAuth2 access tokens for Google admin REST APIs (Identity Toolkit, Firestore).
//!
//! A service-account key signs a short JWT assertion which is exchanged at the
//! key's `token_uri` (JWT bearer grant). The resulting access token is cached
//! until shortly before it expires. Without a key file the emulator's `owner`
//! token is used.
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::services::idp::ProviderError;

const ADMIN_SCOPES: &str = "https://www.googleapis.com/auth/cloud-platform \
https://www.googleapis.com/auth/firebase \
https://www.googleapis.com/auth/identitytoolkit \
https://www.googleapis.com/auth/datastore";

const EMULATOR_TOKEN: &str = "owner";
const ASSERTION_TTL_SECONDS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("cannot read service account key {}: {}", path.display(), e)
        })?;
        let key = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid service account key {}: {}", path.display(), e))?;
        Ok(key)
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    scope: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct SignedAccount {
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct AccessTokenSource {
    http: reqwest::Client,
    account: Option<SignedAccount>,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("AccessTokenSource")
            .field(
                "client_email",
                &self.account.as_ref().map(|a| a.client_email.as_str()),
            )
            .finish()
    }
}

impl AccessTokenSource {
    pub fn new(http: reqwest::Client, key: Option<ServiceAccountKey>) -> anyhow::Result<Self> {
        let account = match key {
            Some(key) => {
                let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
                    .map_err(|e| anyhow::anyhow!("invalid service account private key: {}", e))?;
                Some(SignedAccount {
                    client_email: key.client_email,
                    token_uri: key.token_uri,
                    encoding_key,
                })
            }
            None => {
                tracing::warn!(
                    "no service account key configured; admin REST calls use the emulator token"
                );
                None
            }
        };

        Ok(Self {
            http,
            account,
            cached: Mutex::new(None),
        })
    }

    /// Bearer token for an outbound admin request.
    pub async fn bearer(&self) -> Result<String, ProviderError> {
        let Some(account) = &self.account else {
            return Ok(EMULATOR_TOKEN.to_string());
        };

        // Holding the lock across the exchange keeps concurrent refreshes to one.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange(account).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, account: &SignedAccount) -> Result<CachedToken, ProviderError> {
        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &account.client_email,
            sub: &account.client_email,
            aud: &account.token_uri,
            scope: ADMIN_SCOPES,
            iat,
            exp: iat + ASSERTION_TTL_SECONDS,
        };
        let assertion =
            jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &account.encoding_key)
                .map_err(|e| ProviderError::Rejected(format!("cannot sign assertion: {}", e)))?;

        let resp = self
            .http
            .post(&account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(ProviderError::Unavailable(format!(
                "token endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::Rejected(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("bad token response: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN);

        tracing::debug!(client_email = %account.client_email, "refreshed admin access token");

        Ok(CachedToken {
            value: body.access_token,
            refresh_at,
        })
    }
}
