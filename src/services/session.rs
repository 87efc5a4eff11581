/*
 * Responsibility
 * - login/logout bookkeeping, independent of the gate
 * - at most one active session per identity (open replaces the previous one)
 * - close is idempotent; expiry is noticed lazily, on close
 */
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{NewSession, Session};
use crate::repos::{RepoError, SessionStore, bounded};
use crate::services::identity::{IdentityResolver, ResolveError};

#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds from login; zero or negative means no known expiry.
    pub expires_in: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    AlreadyClosed,
    /// The session had run past its expiry; it is now closed at `expires_at`.
    Expired,
    NotFound,
}

impl CloseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::AlreadyClosed => "already_closed",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unknown identity")]
    UnknownIdentity,
    #[error("session lifetime of {0}s is out of range")]
    InvalidLifetime(i64),
    #[error("session store unavailable")]
    Store(#[from] RepoError),
}

impl From<ResolveError> for LedgerError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound => Self::UnknownIdentity,
            ResolveError::Unavailable(err) => Self::Store(err),
        }
    }
}

pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

// `None` when the lifetime is not positive; an unrepresentable instant is an error.
fn expiry_after(
    login_at: DateTime<Utc>,
    expires_in: i64,
) -> Result<Option<DateTime<Utc>>, LedgerError> {
    if expires_in <= 0 {
        return Ok(None);
    }

    TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| login_at.checked_add_signed(lifetime))
        .map(Some)
        .ok_or(LedgerError::InvalidLifetime(expires_in))
}

#[derive(Clone)]
pub struct SessionLedger {
    store: Arc<dyn SessionStore>,
    identities: IdentityResolver,
    timeout: Duration,
}

impl SessionLedger {
    pub fn new(store: Arc<dyn SessionStore>, identities: IdentityResolver, timeout: Duration) -> Self {
        Self {
            store,
            identities,
            timeout,
        }
    }

    /// Open a session now; any other active session of the identity is closed
    /// in the same transaction.
    pub async fn open(&self, identity_id: Uuid, meta: SessionMeta) -> Result<Session, LedgerError> {
        let identity = self.identities.by_id(identity_id).await?;

        let login_at = Utc::now();
        let expires_at = expiry_after(login_at, meta.expires_in)?;

        let new = NewSession {
            identity_id: identity.id,
            login_at,
            access_token_hash: hash_token(&meta.access_token),
            refresh_token_hash: meta.refresh_token.as_deref().map(hash_token),
            expires_at,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        };

        let session = bounded(self.timeout, self.store.open_session(new)).await?;

        tracing::info!(
            session_id = %session.id,
            identity_id = %session.identity_id,
            expires_at = ?session.expires_at,
            "session opened"
        );

        Ok(session)
    }

    pub async fn close(&self, access_token: &str, at: DateTime<Utc>) -> Result<CloseOutcome, RepoError> {
        let hash = hash_token(access_token);

        let Some(latest) = bounded(self.timeout, self.store.latest_by_token_hash(&hash)).await? else {
            return Ok(CloseOutcome::NotFound);
        };

        if !latest.active {
            return Ok(CloseOutcome::AlreadyClosed);
        }

        let (close_at, outcome) = match latest.expires_at {
            Some(expires_at) if expires_at <= at => (expires_at, CloseOutcome::Expired),
            _ => (at, CloseOutcome::Closed),
        };

        let closed = bounded(self.timeout, self.store.close_session(&hash, close_at)).await?;

        // A concurrent close got there first.
        let outcome = if closed { outcome } else { CloseOutcome::AlreadyClosed };

        tracing::info!(
            session_id = %latest.id,
            identity_id = %latest.identity_id,
            outcome = outcome.as_str(),
            "session close"
        );

        Ok(outcome)
    }
}
