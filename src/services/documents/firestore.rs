//! Firestore REST backend for profile documents.
//!
//! Firestore returns typed field values (`{"stringValue": "..."}`,
//! `{"mapValue": {"fields": {...}}}`, ...); they are decoded into plain JSON so the
//! rest of the gateway never sees the wire encoding.
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use url::Url;

use crate::services::documents::store::{Document, DocumentStore, StoreError};
use crate::services::google_auth::AccessTokenSource;

pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: Url,
    project_id: String,
    tokens: Arc<AccessTokenSource>,
}

#[derive(Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        project_id: impl Into<String>,
        tokens: Arc<AccessTokenSource>,
    ) -> Self {
        Self {
            http,
            base_url,
            project_id: project_id.into(),
            tokens,
        }
    }

    fn document_url(&self, collection: &str, key: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("firestore base url cannot be a base".into()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                collection,
                key,
            ]);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn get_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        let bearer = self
            .tokens
            .bearer()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let resp = self
            .http
            .get(self.document_url(collection, key)?)
            .bearer_auth(bearer)
            .send()
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            s if s.is_success() => {}
            s => {
                return Err(StoreError::Unavailable(format!(
                    "firestore returned {}",
                    s
                )));
            }
        }

        let doc: FirestoreDocument = resp
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        decode_fields(&doc.fields).map(Some)
    }
}

/// Decode a Firestore `fields` map into a JSON object.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Document, StoreError> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::Malformed("field value is not an object".into()))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Malformed("empty field value".into()))?;

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" | "doubleValue" => inner.clone(),
        // int64 travels as a decimal string
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|n| Value::Number(Number::from(n)))
                .map_err(|_| StoreError::Malformed(format!("bad integerValue {s:?}")))?,
            other => other.clone(),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" | "geoPointValue" => {
            inner.clone()
        }
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Value::Array(values)
        }
        "mapValue" => {
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Value::Object(decode_fields(&fields)?)
        }
        other => {
            return Err(StoreError::Malformed(format!(
                "unsupported field type {other}"
            )));
        }
    };

    Ok(decoded)
}
