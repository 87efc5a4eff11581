/*
 * Responsibility
 * - Response DTO for GET /me
 */
use serde::Serialize;
use uuid::Uuid;

use crate::api::v1::extractors::AuthCtx;
use crate::model::{PermissionSet, RoleAssignment, RoleScope};

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub code: String,
    pub name: String,
    pub scope: RoleScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<Uuid>,
}

impl From<RoleAssignment> for RoleResponse {
    fn from(a: RoleAssignment) -> Self {
        Self {
            code: a.role.code,
            name: a.role.name,
            scope: a.role.scope,
            business_id: a.business_id,
            location_id: a.location_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<RoleResponse>,
    pub permissions: PermissionSet,
}

impl From<AuthCtx> for MeResponse {
    fn from(ctx: AuthCtx) -> Self {
        Self {
            id: ctx.identity_id,
            email: ctx.email,
            roles: ctx.roles.into_iter().map(RoleResponse::from).collect(),
            permissions: ctx.permissions,
        }
    }
}
