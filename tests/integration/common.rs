//! Shared fakes for integration tests.
//!
//! Every fake counts its calls so tests can assert on side effects
//! (in particular: "no write happened").
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Map, Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use sqes_gateway::api;
use sqes_gateway::config::AuthSettings;
use sqes_gateway::services::auth::pipeline::{self, Authenticator, VerifiedPipeline};
use sqes_gateway::services::auth::profile::ProfileResolver;
use sqes_gateway::services::auth::verifier::TokenVerifier;
use sqes_gateway::services::auth::{
    AuditEntry, AuditError, AuditSink, AuditStatus, ClaimsMutator,
};
use sqes_gateway::services::documents::{Document, DocumentStore, StoreError};
use sqes_gateway::services::health::{DependencyProbe, HealthService};
use sqes_gateway::services::idp::{
    DecodedClaims, IdentityProvider, ProviderError, UserLookup, UserRecord,
};
use sqes_gateway::state::AppState;

pub const TIMEOUT: Duration = Duration::from_millis(200);
pub const BYPASS_TOKEN: &str = "local-dev-bypass";

pub const VIEWER_TOKEN: &str = "viewer.token.sig";
pub const ADMIN_TOKEN: &str = "admin.token.sig";
pub const QC_TOKEN: &str = "qcreader.token.sig";
pub const DISABLED_TOKEN: &str = "disabled.token.sig";
pub const ORPHAN_TOKEN: &str = "orphan.token.sig";
pub const EXPIRED_TOKEN: &str = "expired.token.sig";
pub const FORGED_TOKEN: &str = "forged.token.sig";

// =============================================================================
// Identity provider
// =============================================================================

#[derive(Clone)]
pub enum TokenOutcome {
    Claims(Value),
    Expired,
    Invalid,
    Unavailable,
}

#[derive(Default)]
pub struct FakeProvider {
    pub tokens: Mutex<HashMap<String, TokenOutcome>>,
    pub users: Mutex<HashMap<String, UserRecord>>,
    pub verify_delay: Option<Duration>,
    /// Writes are rejected outright (nothing applied).
    pub fail_writes: bool,
    /// Writes fail with a transport error (nothing applied, outcome unknown to the caller).
    pub writes_unavailable: bool,
    /// Writes are applied, then the call stalls for this long.
    pub write_delay: Option<Duration>,
    pub verify_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
    pub writes: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl FakeProvider {
    pub fn with_token(self, token: &str, outcome: TokenOutcome) -> Self {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), outcome);
        self
    }

    pub fn with_user(self, uid: &str, email: &str, custom_claims: Value) -> Self {
        self.users.lock().unwrap().insert(
            uid.to_string(),
            UserRecord {
                uid: uid.to_string(),
                email: Some(email.to_string()),
                disabled: false,
                custom_claims: custom_claims.as_object().cloned().unwrap_or_default(),
            },
        );
        self
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn last_write(&self) -> Option<(String, Map<String, Value>)> {
        self.writes.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    async fn verify_token(&self, raw: &str) -> Result<DecodedClaims, ProviderError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.verify_delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self.tokens.lock().unwrap().get(raw).cloned();
        match outcome {
            Some(TokenOutcome::Claims(v)) => Ok(v.as_object().cloned().unwrap_or_default()),
            Some(TokenOutcome::Expired) => Err(ProviderError::ExpiredToken),
            Some(TokenOutcome::Unavailable) => Err(ProviderError::Unavailable("down".into())),
            Some(TokenOutcome::Invalid) | None => {
                Err(ProviderError::InvalidToken("bad signature".into()))
            }
        }
    }

    async fn lookup_user(&self, lookup: &UserLookup) -> Result<Option<UserRecord>, ProviderError> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let users = self.users.lock().unwrap();
        Ok(match lookup {
            UserLookup::Uid(uid) => users.get(uid).cloned(),
            UserLookup::Email(email) => users
                .values()
                .find(|u| u.email.as_deref() == Some(email.as_str()))
                .cloned(),
        })
    }

    async fn set_custom_claims(
        &self,
        subject_id: &str,
        claims: &Map<String, Value>,
    ) -> Result<(), ProviderError> {
        if self.fail_writes {
            return Err(ProviderError::Rejected("INVALID_CLAIMS".into()));
        }
        if self.writes_unavailable {
            return Err(ProviderError::Unavailable("connection reset".into()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((subject_id.to_string(), claims.clone()));
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

// =============================================================================
// Profile store
// =============================================================================

#[derive(Default)]
pub struct FakeStore {
    pub docs: Mutex<HashMap<String, Document>>,
    pub unavailable: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_profile(self, subject: &str, doc: Value) -> Self {
        self.docs
            .lock()
            .unwrap()
            .insert(subject.to_string(), doc.as_object().cloned().unwrap_or_default());
        self
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn get_document(
        &self,
        _collection: &str,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(self.docs.lock().unwrap().get(key).cloned())
    }
}

// =============================================================================
// Audit sink
// =============================================================================

#[derive(Default)]
pub struct FakeAudit {
    pub records: Mutex<Vec<(Uuid, AuditEntry, AuditStatus, Option<String>)>>,
    pub fail_begin: bool,
    pub fail_commit: bool,
}

impl FakeAudit {
    pub fn statuses(&self) -> Vec<AuditStatus> {
        self.records.lock().unwrap().iter().map(|r| r.2).collect()
    }

    fn set_status(&self, id: Uuid, status: AuditStatus, detail: Option<&str>) {
        if let Some(record) = self.records.lock().unwrap().iter_mut().find(|r| r.0 == id) {
            record.2 = status;
            record.3 = detail.map(str::to_string);
        }
    }
}

#[async_trait]
impl AuditSink for FakeAudit {
    async fn begin(&self, entry: &AuditEntry) -> Result<Uuid, AuditError> {
        if self.fail_begin {
            return Err(AuditError::Store("insert failed".into()));
        }
        let id = Uuid::new_v4();
        self.records
            .lock()
            .unwrap()
            .push((id, entry.clone(), AuditStatus::Pending, None));
        Ok(id)
    }

    async fn commit(&self, id: Uuid) -> Result<(), AuditError> {
        if self.fail_commit {
            return Err(AuditError::Store("update failed".into()));
        }
        self.set_status(id, AuditStatus::Committed, None);
        Ok(())
    }

    async fn fail(&self, id: Uuid, detail: &str) -> Result<(), AuditError> {
        self.set_status(id, AuditStatus::Failed, Some(detail));
        Ok(())
    }
}

// =============================================================================
// Health probe
// =============================================================================

pub struct FakeProbe {
    pub name: &'static str,
    pub up: bool,
}

#[async_trait]
impl DependencyProbe for FakeProbe {
    fn component(&self) -> &'static str {
        self.name
    }

    async fn ping(&self) -> Result<(), String> {
        if self.up {
            Ok(())
        } else {
            Err("connection refused".into())
        }
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn claims_for(sub: &str, email: &str) -> TokenOutcome {
    TokenOutcome::Claims(json!({
        "sub": sub,
        "email": email,
        "email_verified": true,
    }))
}

/// Provider and store populated with the standard cast of subjects.
pub fn standard_backends() -> (FakeProvider, FakeStore) {
    let provider = FakeProvider::default()
        .with_token(VIEWER_TOKEN, claims_for("viewer-1", "viewer@x.com"))
        .with_token(ADMIN_TOKEN, claims_for("admin-1", "admin@x.com"))
        .with_token(QC_TOKEN, claims_for("u1", "a@x.com"))
        .with_token(DISABLED_TOKEN, claims_for("disabled-1", "gone@x.com"))
        .with_token(ORPHAN_TOKEN, claims_for("orphan-1", "new@x.com"))
        .with_token(EXPIRED_TOKEN, TokenOutcome::Expired)
        .with_token(FORGED_TOKEN, TokenOutcome::Invalid)
        .with_user("target-1", "target@x.com", json!({"role": "user", "tenant": "bmkg"}));

    let store = FakeStore::default()
        .with_profile("viewer-1", json!({"roles": ["viewer"]}))
        .with_profile("admin-1", json!({"roles": ["admin"]}))
        .with_profile("u1", json!({"roles": ["qc_reader"], "disabled": false}))
        .with_profile("disabled-1", json!({"roles": ["admin"], "disabled": true}));

    (provider, store)
}

pub fn verified_pipeline(provider: Arc<FakeProvider>, store: Arc<FakeStore>) -> VerifiedPipeline {
    VerifiedPipeline::new(
        TokenVerifier::new(provider, TIMEOUT),
        ProfileResolver::new(store, "Users", TIMEOUT),
    )
}

pub fn settings(bypass: bool) -> AuthSettings {
    AuthSettings {
        is_production: false,
        debug_bypass_enabled: bypass,
        debug_bypass_token: bypass.then(|| BYPASS_TOKEN.to_string()),
        request_timeout: TIMEOUT,
        admin_scope_name: "admin".to_string(),
    }
}

pub struct TestApp {
    pub provider: Arc<FakeProvider>,
    pub store: Arc<FakeStore>,
    pub audit: Arc<FakeAudit>,
    pub router: Router,
}

pub fn test_app(provider: FakeProvider, store: FakeStore, probes_up: bool) -> TestApp {
    let provider = Arc::new(provider);
    let store = Arc::new(store);
    let audit = Arc::new(FakeAudit::default());

    let auth: Arc<dyn Authenticator> =
        pipeline::select(&settings(false), verified_pipeline(provider.clone(), store.clone()))
            .unwrap();
    let mutator = Arc::new(ClaimsMutator::new(provider.clone(), audit.clone(), TIMEOUT));
    let probes: Vec<Arc<dyn DependencyProbe>> = vec![
        Arc::new(FakeProbe {
            name: "postgresql_database",
            up: true,
        }),
        Arc::new(FakeProbe {
            name: "mysql_database",
            up: probes_up,
        }),
    ];
    let health = Arc::new(HealthService::new(probes, TIMEOUT, None));

    let state = AppState::new(auth, mutator, health, "admin");
    let router = api::routes(state.clone()).with_state(state);

    TestApp {
        provider,
        store,
        audit,
        router,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send(router: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}
