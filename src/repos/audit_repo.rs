/*
 * Responsibility
 * - audit_log inserts (one row per decision)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::repos::error::RepoResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub identity_id: Option<Uuid>,
    pub action: &'static str,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> RepoResult<()>;
}

#[derive(Clone, Debug)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn record(&self, entry: &AuditEntry) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (user_id, action, details, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(entry.identity_id)
        .bind(entry.action)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
