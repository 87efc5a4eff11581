/*
 * Responsibility
 * - session_log persistence
 * - open: deactivate the identity's active session + insert, in one transaction
 * - close: flip the active row for a token hash
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::model::{NewSession, Session};
use crate::repos::error::RepoResult;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Deactivate every active session of the identity (logout_at = login_at of the
    /// new one) and insert the new active session, atomically.
    async fn open_session(&self, new: NewSession) -> RepoResult<Session>;
    /// Most recent session recorded for this access-token digest.
    async fn latest_by_token_hash(&self, token_hash: &[u8]) -> RepoResult<Option<Session>>;
    /// Returns `false` when no active row matched.
    async fn close_session(&self, token_hash: &[u8], at: DateTime<Utc>) -> RepoResult<bool>;
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    login_at: DateTime<Utc>,
    logout_at: Option<DateTime<Utc>>,
    access_token_hash: Vec<u8>,
    refresh_token_hash: Option<Vec<u8>>,
    token_expires_at: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    is_active: bool,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            identity_id: row.user_id,
            login_at: row.login_at,
            logout_at: row.logout_at,
            access_token_hash: row.access_token_hash,
            refresh_token_hash: row.refresh_token_hash,
            expires_at: row.token_expires_at,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            active: row.is_active,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn open_session(&self, new: NewSession) -> RepoResult<Session> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent opens for the same identity.
        sqlx::query("SELECT id FROM user_profile WHERE id = $1 FOR UPDATE")
            .bind(new.identity_id)
            .fetch_optional(&mut *tx)
            .await?;

        // Racing opens read the clock before the lock; login order follows lock order.
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT max(login_at) FROM session_log WHERE user_id = $1 AND is_active = true",
        )
        .bind(new.identity_id)
        .fetch_one(&mut *tx)
        .await?;
        let login_at = latest.map_or(new.login_at, |at| at.max(new.login_at));

        sqlx::query(
            r#"
            UPDATE session_log
            SET is_active = false, logout_at = $2
            WHERE user_id = $1 AND is_active = true
            "#,
        )
        .bind(new.identity_id)
        .bind(login_at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO session_log (
                user_id, login_at, ip_address, user_agent,
                access_token_hash, refresh_token_hash, token_expires_at, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, true)
            RETURNING id, user_id, login_at, logout_at, access_token_hash,
                      refresh_token_hash, token_expires_at, ip_address, user_agent, is_active
            "#,
        )
        .bind(new.identity_id)
        .bind(login_at)
        .bind(new.ip_address)
        .bind(new.user_agent)
        .bind(new.access_token_hash)
        .bind(new.refresh_token_hash)
        .bind(new.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into())
    }

    async fn latest_by_token_hash(&self, token_hash: &[u8]) -> RepoResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, user_id, login_at, logout_at, access_token_hash,
                   refresh_token_hash, token_expires_at, ip_address, user_agent, is_active
            FROM session_log
            WHERE access_token_hash = $1
            ORDER BY login_at DESC
            LIMIT 1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Session::from))
    }

    async fn close_session(&self, token_hash: &[u8], at: DateTime<Utc>) -> RepoResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE session_log
            SET logout_at = $1, is_active = false
            WHERE access_token_hash = $2 AND is_active = true
            "#,
        )
        .bind(at)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected() > 0)
    }
}
