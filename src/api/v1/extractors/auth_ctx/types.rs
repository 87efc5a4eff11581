/*
 * Responsibility
 * - The authorized caller, as handlers see it
 * - Built by the access middleware from the gate's Principal on ALLOW
 */
use uuid::Uuid;

use crate::model::{PermissionSet, RoleAssignment};
use crate::services::Principal;

#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub identity_id: Uuid,
    pub external_subject: String,
    pub email: String,
    pub roles: Vec<RoleAssignment>,
    /// Recomputed for this request only.
    pub permissions: PermissionSet,
    pub token_expires_at: u64,
}

impl From<Principal> for AuthCtx {
    fn from(p: Principal) -> Self {
        Self {
            identity_id: p.identity.id,
            external_subject: p.identity.external_subject,
            email: p.identity.email,
            roles: p.roles,
            permissions: p.permissions,
            token_expires_at: p.token_expires_at,
        }
    }
}
