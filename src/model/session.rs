use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One login of one identity. Tokens are held as SHA-256 digests only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub login_at: DateTime<Utc>,
    pub logout_at: Option<DateTime<Utc>>,
    pub access_token_hash: Vec<u8>,
    pub refresh_token_hash: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub active: bool,
}

/// Row to insert when a session is opened.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub identity_id: Uuid,
    pub login_at: DateTime<Utc>,
    pub access_token_hash: Vec<u8>,
    pub refresh_token_hash: Option<Vec<u8>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
