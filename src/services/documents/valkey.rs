use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::services::cache::{CacheClient, ValkeyClient};
use crate::services::documents::store::{Document, DocumentStore, StoreError};

/// Valkey-backed document store.
///
/// Documents are JSON objects stored as strings under `<collection>:<key>`.
/// Handy for local development and integration environments without Firestore.
#[derive(Clone)]
pub struct ValkeyDocumentStore<C: CacheClient> {
    cache: Arc<C>,
}

impl ValkeyDocumentStore<ValkeyClient> {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = ValkeyClient::new(url).await?;
        Ok(Self::new_with_cache(Arc::new(client)))
    }
}

impl<C: CacheClient> ValkeyDocumentStore<C> {
    pub fn new_with_cache(cache: Arc<C>) -> Self {
        Self { cache }
    }

    pub fn key(collection: &str, key: &str) -> String {
        format!("{}:{}", collection, key)
    }
}

#[async_trait]
impl<C: CacheClient> DocumentStore for ValkeyDocumentStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn get_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        let Some(raw) = self.cache.get_string(&Self::key(collection, key)).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(doc)) => Ok(Some(doc)),
            Ok(_) => Err(StoreError::Malformed("document is not a JSON object".into())),
            Err(e) => Err(StoreError::Malformed(e.to_string())),
        }
    }
}
