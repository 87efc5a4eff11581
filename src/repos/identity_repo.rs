/*
 * Responsibility
 * - user_profile lookups (read only; registration lives elsewhere)
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::model::{Identity, IdentityStatus};
use crate::repos::error::RepoResult;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_external_subject(&self, subject: &str) -> RepoResult<Option<Identity>>;
    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Identity>>;
}

#[derive(Debug, FromRow)]
struct IdentityRow {
    id: Uuid,
    external_subject: String,
    email: String,
    status: String,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Self {
            id: row.id,
            external_subject: row.external_subject,
            email: row.email,
            status: IdentityStatus::from_db(&row.status),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_external_subject(&self, subject: &str) -> RepoResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, external_subject, email, status
            FROM user_profile
            WHERE external_subject = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, external_subject, email, status
            FROM user_profile
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Identity::from))
    }
}
