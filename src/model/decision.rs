use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::RequiredPermission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Allow,
    DenyNoToken,
    DenyInvalidToken,
    DenyNoRoles,
    DenyInsufficientPermission,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::DenyNoToken => "DENY_NO_TOKEN",
            Self::DenyInvalidToken => "DENY_INVALID_TOKEN",
            Self::DenyNoRoles => "DENY_NO_ROLES",
            Self::DenyInsufficientPermission => "DENY_INSUFFICIENT_PERMISSION",
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Terminal result of one authorization attempt. Written once to the audit sink.
#[derive(Debug, Clone)]
pub struct Decision {
    pub identity_id: Option<Uuid>,
    pub required_permission: RequiredPermission,
    pub outcome: Outcome,
    /// Finer-grained cause; several reasons share one outcome.
    pub reason: &'static str,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    pub fn is_dependency_failure(&self) -> bool {
        self.reason == reason::DEPENDENCY_UNAVAILABLE
    }
}

pub mod reason {
    pub const GRANTED: &str = "granted";
    pub const NO_TOKEN: &str = "no_token";
    pub const MALFORMED: &str = "malformed";
    pub const MISSING_ALG: &str = "missing_alg";
    pub const UNSUPPORTED_ALGORITHM: &str = "unsupported_algorithm";
    pub const MISSING_KEY_ID: &str = "missing_key_id";
    pub const UNKNOWN_KEY: &str = "unknown_key";
    pub const INVALID_SIGNATURE: &str = "invalid_signature";
    pub const EXPIRED: &str = "expired";
    pub const INVALID_CLAIMS: &str = "invalid_claims";
    pub const MISSING_SUBJECT: &str = "missing_subject";
    pub const IDENTITY_NOT_FOUND: &str = "identity_not_found";
    pub const IDENTITY_DISABLED: &str = "identity_disabled";
    pub const NO_ROLES: &str = "no_roles";
    pub const ROLES_WITHOUT_PERMISSIONS: &str = "roles_without_permissions";
    pub const INSUFFICIENT_PERMISSION: &str = "insufficient_permission";
    pub const DEPENDENCY_UNAVAILABLE: &str = "dependency_unavailable";
}
