/*
 * Responsibility
 * - Request/response DTOs for POST /sessions and POST /logout
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Session;

/// Longest session a client may ask for (one year).
pub const MAX_EXPIRES_IN_SECONDS: i64 = 366 * 24 * 60 * 60;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds; defaults to the remaining lifetime of the access token.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl CreateSessionRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(token) = &self.refresh_token
            && token.trim().is_empty()
        {
            return Err("refresh_token must not be blank");
        }
        if let Some(secs) = self.expires_in
            && secs < 0
        {
            return Err("expires_in must be >= 0");
        }
        if let Some(secs) = self.expires_in
            && secs > MAX_EXPIRES_IN_SECONDS
        {
            return Err("expires_in exceeds the maximum session lifetime");
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub login_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            identity_id: s.identity_id,
            login_at: s.login_at,
            expires_at: s.expires_at,
            active: s.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
    pub outcome: &'static str,
}
