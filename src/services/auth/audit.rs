//! Audit trail for claim mutations.
//!
//! Two-phase: a `pending` record is written before the provider write, then
//! finalised as `committed` or `failed`. A crash in between leaves a pending
//! record behind instead of a silent, unaudited change.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store error: {0}")]
    Store(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Pending,
    Committed,
    Failed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Committed => "committed",
            AuditStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub caller_subject: String,
    pub target_subject: String,
    pub old_roles: Vec<String>,
    pub new_roles: Vec<String>,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    /// Persist `entry` as pending and return its id.
    async fn begin(&self, entry: &AuditEntry) -> Result<Uuid, AuditError>;

    async fn commit(&self, id: Uuid) -> Result<(), AuditError>;

    async fn fail(&self, id: Uuid, detail: &str) -> Result<(), AuditError>;
}
