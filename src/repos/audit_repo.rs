/*
 * Responsibility
 * - claims_audit table (PostgreSQL)
 * - pending → committed | failed transitions for claim mutations
 */
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::RepoError;
use crate::services::auth::audit::{AuditEntry, AuditError, AuditSink, AuditStatus};

#[derive(Clone)]
pub struct ClaimsAuditRepo {
    db: PgPool,
}

impl ClaimsAuditRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn ensure_schema(&self) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claims_audit (
                id             UUID PRIMARY KEY,
                caller_subject TEXT NOT NULL,
                target_subject TEXT NOT NULL,
                old_roles      TEXT[] NOT NULL,
                new_roles      TEXT[] NOT NULL,
                status         TEXT NOT NULL CHECK (status IN ('pending', 'committed', 'failed')),
                detail         TEXT,
                created_at     TIMESTAMPTZ NOT NULL,
                updated_at     TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn insert_pending(&self, entry: &AuditEntry) -> Result<Uuid, RepoError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO claims_audit
                (id, caller_subject, target_subject, old_roles, new_roles, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            "#,
        )
        .bind(id)
        .bind(&entry.caller_subject)
        .bind(&entry.target_subject)
        .bind(&entry.old_roles)
        .bind(&entry.new_roles)
        .bind(AuditStatus::Pending.as_str())
        .bind(entry.at)
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    /// Moves a pending record to its final status. Finalised records are left untouched.
    pub async fn finalize(
        &self,
        id: Uuid,
        status: AuditStatus,
        detail: Option<&str>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE claims_audit
            SET status = $2, detail = $3, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(detail)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::MissingRecord(id));
        }
        Ok(())
    }
}

impl From<RepoError> for AuditError {
    fn from(e: RepoError) -> Self {
        AuditError::Store(e.to_string())
    }
}

#[async_trait]
impl AuditSink for ClaimsAuditRepo {
    async fn begin(&self, entry: &AuditEntry) -> Result<Uuid, AuditError> {
        Ok(self.insert_pending(entry).await?)
    }

    async fn commit(&self, id: Uuid) -> Result<(), AuditError> {
        Ok(self.finalize(id, AuditStatus::Committed, None).await?)
    }

    async fn fail(&self, id: Uuid, detail: &str) -> Result<(), AuditError> {
        Ok(self.finalize(id, AuditStatus::Failed, Some(detail)).await?)
    }
}
