//! Firebase Authentication as the external identity provider.
//!
//! - ID tokens are RS256 JWTs signed by Google; they are verified against the
//!   published JWK set (`iss = https://securetoken.google.com/<project>`, `aud = <project>`).
//! - Account lookup and custom claims go through the Identity Toolkit admin REST API.
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::config::FirebaseSettings;
use crate::services::google_auth::AccessTokenSource;
use crate::services::idp::client::{
    DecodedClaims, IdentityProvider, ProviderError, UserLookup, UserRecord,
};

// Google rotates signing keys daily; an hour keeps us well inside that window.
const JWKS_MAX_AGE: Duration = Duration::from_secs(3600);
// An unknown `kid` triggers at most one refetch per cooldown.
const JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(60);
const MAX_SUBJECT_LEN: usize = 128;

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

enum KeyLookup<'a> {
    Found(&'a Jwk),
    Unknown,
    Refresh,
}

impl CachedKeys {
    fn lookup(&self, kid: &str, age: Duration) -> KeyLookup<'_> {
        if age >= JWKS_MAX_AGE {
            return KeyLookup::Refresh;
        }
        match self.keys.find(kid) {
            Some(jwk) => KeyLookup::Found(jwk),
            None if age < JWKS_REFRESH_COOLDOWN => KeyLookup::Unknown,
            None => KeyLookup::Refresh,
        }
    }
}

pub struct FirebaseAuth {
    http: reqwest::Client,
    project_id: String,
    jwks_url: Url,
    admin_base: Url,
    validation: Validation,
    tokens: Arc<AccessTokenSource>,
    keys: RwLock<Option<CachedKeys>>,
    refresh: Mutex<()>,
}

impl std::fmt::Debug for FirebaseAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseAuth")
            .field("project_id", &self.project_id)
            .field("jwks_url", &self.jwks_url.as_str())
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    disabled: bool,
    // JSON object serialized as a string
    #[serde(default)]
    custom_attributes: Option<String>,
}

impl FirebaseAuth {
    pub fn new(
        http: reqwest::Client,
        settings: &FirebaseSettings,
        tokens: Arc<AccessTokenSource>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            settings.project_id
        )]);
        validation.set_audience(&[settings.project_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);

        Self {
            http,
            project_id: settings.project_id.clone(),
            jwks_url: settings.jwks_url.clone(),
            admin_base: settings.identity_toolkit_base_url.clone(),
            validation,
            tokens,
            keys: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    fn admin_url(&self, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/accounts:{}",
            self.admin_base.as_str().trim_end_matches('/'),
            self.project_id,
            method
        )
    }

    async fn fetch_keys(&self) -> Result<JwkSet, ProviderError> {
        let resp = self.http.get(self.jwks_url.clone()).send().await?;
        if !resp.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "jwks endpoint returned {}",
                resp.status()
            )));
        }
        resp.json::<JwkSet>()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("bad jwks document: {}", e)))
    }

    /// Key for `kid` from the cached set. `Ok(None)` when a refetch is due.
    async fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>, ProviderError> {
        let cached = self.keys.read().await;
        let Some(c) = cached.as_ref() else {
            return Ok(None);
        };
        match c.lookup(kid, c.fetched_at.elapsed()) {
            KeyLookup::Found(jwk) => DecodingKey::from_jwk(jwk)
                .map(Some)
                .map_err(|e| ProviderError::InvalidToken(e.to_string())),
            KeyLookup::Unknown => Err(ProviderError::InvalidToken(
                "unknown signing key".to_string(),
            )),
            KeyLookup::Refresh => Ok(None),
        }
    }

    /// Decoding key for `kid`; the cached key set is refreshed when stale or when
    /// the `kid` is unknown (key rotation), one refresh at a time.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, ProviderError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        let _refreshing = self.refresh.lock().await;
        // Another request may have refreshed the set while this one waited.
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        tracing::debug!(kid, "fetching signing keys");
        let keys = self.fetch_keys().await?;
        let key = keys
            .find(kid)
            .map(DecodingKey::from_jwk)
            .transpose()
            .map_err(|e| ProviderError::InvalidToken(e.to_string()))?;

        *self.keys.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| ProviderError::InvalidToken("unknown signing key".to_string()))
    }

    async fn admin_post(&self, method: &str, body: Value) -> Result<reqwest::Response, ProviderError> {
        let bearer = self.tokens.bearer().await?;
        let resp = self
            .http
            .post(self.admin_url(method))
            .bearer_auth(bearer)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let detail = resp.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Unavailable(format!(
                "accounts:{} returned {}",
                method, status
            )));
        }
        if detail.contains("USER_NOT_FOUND") {
            return Err(ProviderError::UserNotFound);
        }
        Err(ProviderError::Rejected(format!(
            "accounts:{} returned {}",
            method, status
        )))
    }
}

fn classify_jwt_error(e: jsonwebtoken::errors::Error) -> ProviderError {
    match e.kind() {
        ErrorKind::ExpiredSignature => ProviderError::ExpiredToken,
        _ => ProviderError::InvalidToken(e.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    fn provider_name(&self) -> &'static str {
        "firebase"
    }

    async fn verify_token(&self, raw: &str) -> Result<DecodedClaims, ProviderError> {
        let header = jsonwebtoken::decode_header(raw).map_err(classify_jwt_error)?;
        if header.alg != Algorithm::RS256 {
            return Err(ProviderError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| ProviderError::InvalidToken("missing 'kid' header".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let data = jsonwebtoken::decode::<DecodedClaims>(raw, &key, &self.validation)
            .map_err(classify_jwt_error)?;
        let claims = data.claims;

        // Provider-specific constraints on top of the JWT checks.
        let sub_ok = claims
            .get("sub")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty() && s.len() <= MAX_SUBJECT_LEN);
        if !sub_ok {
            return Err(ProviderError::InvalidToken("invalid 'sub' claim".to_string()));
        }
        if let Some(auth_time) = claims.get("auth_time").and_then(Value::as_i64)
            && auth_time > chrono::Utc::now().timestamp() + self.validation.leeway as i64
        {
            return Err(ProviderError::InvalidToken(
                "'auth_time' is in the future".to_string(),
            ));
        }

        Ok(claims)
    }

    async fn lookup_user(&self, lookup: &UserLookup) -> Result<Option<UserRecord>, ProviderError> {
        let body = match lookup {
            UserLookup::Uid(uid) => json!({ "localId": [uid] }),
            UserLookup::Email(email) => json!({ "email": [email] }),
        };

        let resp = match self.admin_post("lookup", body).await {
            Ok(resp) => resp,
            Err(ProviderError::UserNotFound) => return Ok(None),
            Err(e) => return Err(e),
        };
        let parsed: LookupResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("bad lookup response: {}", e)))?;

        let Some(account) = parsed.users.into_iter().next() else {
            return Ok(None);
        };

        let custom_claims = match account.custom_attributes.as_deref() {
            None | Some("") => Map::new(),
            Some(raw) => serde_json::from_str::<Map<String, Value>>(raw).map_err(|e| {
                ProviderError::Rejected(format!("custom attributes are not an object: {}", e))
            })?,
        };

        Ok(Some(UserRecord {
            uid: account.local_id,
            email: account.email,
            disabled: account.disabled,
            custom_claims,
        }))
    }

    async fn set_custom_claims(
        &self,
        subject_id: &str,
        claims: &Map<String, Value>,
    ) -> Result<(), ProviderError> {
        let encoded = serde_json::to_string(claims)
            .map_err(|e| ProviderError::Rejected(format!("cannot encode claims: {}", e)))?;
        self.admin_post(
            "update",
            json!({ "localId": subject_id, "customAttributes": encoded }),
        )
        .await?;
        Ok(())
    }
}
