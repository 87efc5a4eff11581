/*
 * Responsibility
 * - Role / Permission / RoleAssignment
 * - PermissionCode (validated capability token) and PermissionSet (union result)
 * - RequiredPermission used by the gate
 */
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const MAX_CODE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    Global,
    Business,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Business => "business",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "global" => Self::Global,
            _ => Self::Business,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub scope: RoleScope,
}

/// One edge `(identity, role)`; business/location narrow where the role applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(default)]
    pub business_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub code: PermissionCode,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission code: {0:?}")]
pub struct InvalidPermissionCode(pub String);

/// Flat capability token such as `MANAGE_USERS`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionCode(String);

impl PermissionCode {
    pub fn parse(raw: &str) -> Result<Self, InvalidPermissionCode> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_CODE_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(InvalidPermissionCode(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PermissionCode {
    type Error = InvalidPermissionCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionCode> for String {
    fn from(code: PermissionCode) -> Self {
        code.0
    }
}

/// Union of permission codes across all roles of one identity.
///
/// Built per request and dropped with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<PermissionCode>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: PermissionCode) -> bool {
        self.0.insert(code)
    }

    pub fn extend<I: IntoIterator<Item = PermissionCode>>(&mut self, codes: I) {
        self.0.extend(codes);
    }

    pub fn contains(&self, code: &PermissionCode) -> bool {
        self.0.contains(code)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionCode> {
        self.0.iter()
    }
}

impl FromIterator<PermissionCode> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a route demands of its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequiredPermission {
    /// Any verified identity holding at least one permission.
    AuthenticatedOnly,
    Code(PermissionCode),
}

impl RequiredPermission {
    /// `""` means authenticated-only.
    pub fn parse(raw: &str) -> Result<Self, InvalidPermissionCode> {
        if raw.is_empty() {
            return Ok(Self::AuthenticatedOnly);
        }
        PermissionCode::parse(raw).map(Self::Code)
    }

    pub fn is_satisfied_by(&self, permissions: &PermissionSet) -> bool {
        match self {
            Self::AuthenticatedOnly => true,
            Self::Code(code) => permissions.contains(code),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthenticatedOnly => "",
            Self::Code(code) => code.as_str(),
        }
    }
}

impl fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthenticatedOnly => f.write_str("(authenticated)"),
            Self::Code(code) => f.write_str(code.as_str()),
        }
    }
}
