//! Profile resolution: the subject's extended record in the document store.
use std::sync::Arc;
use std::time::Duration;

use crate::services::auth::error::AuthError;
use crate::services::documents::{Document, DocumentStore, StoreError};

/// Profile document as stored, keyed by subject id.
#[derive(Debug, Clone)]
pub struct Profile {
    subject_id: String,
    document: Document,
}

impl Profile {
    pub fn new(subject_id: impl Into<String>, document: Document) -> Self {
        Self {
            subject_id: subject_id.into(),
            document,
        }
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// Read-only lookup of profile documents.
///
/// Results are not cached: a profile change (role, disabled flag) applies to the
/// very next request.
#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn DocumentStore>,
    collection: String,
    timeout: Duration,
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            collection: collection.into(),
            timeout,
        }
    }

    pub async fn resolve(&self, subject_id: &str) -> Result<Profile, AuthError> {
        if subject_id.is_empty() {
            return Err(AuthError::InconsistentIdentity("token subject"));
        }

        let lookup = self.store.get_document(&self.collection, subject_id);
        let result = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| {
                tracing::warn!(
                    backend = self.store.backend_name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "profile lookup timed out"
                );
                AuthError::unavailable("profile store timed out")
            })?;

        match result {
            Ok(Some(document)) => {
                tracing::debug!(subject_id, "profile resolved");
                Ok(Profile::new(subject_id, document))
            }
            Ok(None) => {
                tracing::warn!(subject_id, "no profile document for verified subject");
                Err(AuthError::ProfileNotFound)
            }
            Err(StoreError::Malformed(detail)) => {
                tracing::warn!(subject_id, %detail, "profile document is malformed");
                Err(AuthError::InconsistentIdentity("profile document"))
            }
            Err(StoreError::Unavailable(detail)) => {
                tracing::error!(
                    subject_id,
                    backend = self.store.backend_name(),
                    %detail,
                    "profile store unavailable"
                );
                Err(AuthError::unavailable("profile store unavailable"))
            }
        }
    }
}
