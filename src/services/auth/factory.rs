/// Factory: build the authentication stack from application `Config`.
///
/// Provider and store handles are constructed once here and shared for the
/// process lifetime; nothing in the pipeline reaches for ambient globals.
use std::sync::Arc;

use anyhow::Context;

use crate::config::{Config, ProfileStoreKind};
use crate::services::auth::pipeline::{self, Authenticator, VerifiedPipeline};
use crate::services::auth::profile::ProfileResolver;
use crate::services::auth::verifier::TokenVerifier;
use crate::services::documents::{DocumentStore, FirestoreStore, ValkeyDocumentStore};
use crate::services::google_auth::{AccessTokenSource, ServiceAccountKey};
use crate::services::idp::{FirebaseAuth, IdentityProvider};

pub struct AuthComponents {
    pub authenticator: Arc<dyn Authenticator>,
    pub provider: Arc<dyn IdentityProvider>,
}

pub async fn build_auth_components(
    config: &Config,
    http: reqwest::Client,
) -> anyhow::Result<AuthComponents> {
    let key = config
        .firebase
        .service_account_key_path
        .as_deref()
        .map(ServiceAccountKey::from_file)
        .transpose()?;
    let tokens = Arc::new(AccessTokenSource::new(http.clone(), key)?);

    let provider: Arc<dyn IdentityProvider> = Arc::new(FirebaseAuth::new(
        http.clone(),
        &config.firebase,
        tokens.clone(),
    ));

    let store: Arc<dyn DocumentStore> = match config.profile_store {
        ProfileStoreKind::Firestore => Arc::new(FirestoreStore::new(
            http,
            config.firebase.firestore_base_url.clone(),
            config.firebase.project_id.clone(),
            tokens,
        )),
        ProfileStoreKind::Valkey => Arc::new(
            ValkeyDocumentStore::connect(&config.valkey_url)
                .await
                .context("connect profile store (valkey)")?,
        ),
    };

    tracing::info!(
        provider = provider.provider_name(),
        store = store.backend_name(),
        collection = %config.profile_collection,
        "auth backends ready"
    );

    let timeout = config.auth.request_timeout;
    let verified = VerifiedPipeline::new(
        TokenVerifier::new(provider.clone(), timeout),
        ProfileResolver::new(store, config.profile_collection.clone(), timeout),
    );
    let authenticator = pipeline::select(&config.auth, verified)?;

    Ok(AuthComponents {
        authenticator,
        provider,
    })
}
