use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::services::cache::CacheError;

/// A document as a JSON object.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document is malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<CacheError> for StoreError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InvalidValue(msg) => StoreError::Malformed(msg),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Read-only document lookup.
///
/// - `Ok(Some(doc))`: document exists
/// - `Ok(None)`: no document under `collection/key`
/// - `Err(_)`: backend failure (callers fail closed)
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    async fn get_document(&self, collection: &str, key: &str)
    -> Result<Option<Document>, StoreError>;
}
