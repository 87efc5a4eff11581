use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Local identity record, linked to the identity provider through `external_subject`.
///
/// The authorization core only reads identities; creating them is the job of the
/// registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub external_subject: String,
    pub email: String,
    pub status: IdentityStatus,
}

impl Identity {
    pub fn is_active(&self) -> bool {
        matches!(self.status, IdentityStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    Active,
    Disabled,
}

impl IdentityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }

    // Unknown values are treated as disabled so a bad row can never grant access.
    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            _ => Self::Disabled,
        }
    }
}
