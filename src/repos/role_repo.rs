/*
 * Responsibility
 * - role assignments of an identity, permissions of a role
 * - the full permission catalog (startup validation of route requirements)
 */
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::model::{PermissionCode, Role, RoleAssignment, RoleScope};
use crate::repos::error::RepoResult;

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// All assignments of the identity. An empty vec is a valid answer.
    async fn roles_of(&self, identity_id: Uuid) -> RepoResult<Vec<RoleAssignment>>;
    /// Permission codes attached to the role. May be empty.
    async fn permissions_of(&self, role_id: Uuid) -> RepoResult<Vec<PermissionCode>>;
    async fn permission_codes(&self) -> RepoResult<Vec<PermissionCode>>;
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    role_id: Uuid,
    role_code: String,
    name: String,
    scope: String,
    business_id: Option<Uuid>,
    location_id: Option<Uuid>,
}

impl From<AssignmentRow> for RoleAssignment {
    fn from(row: AssignmentRow) -> Self {
        Self {
            role: Role {
                id: row.role_id,
                code: row.role_code,
                name: row.name,
                scope: RoleScope::from_db(&row.scope),
            },
            business_id: row.business_id,
            location_id: row.location_id,
        }
    }
}

// Codes that do not parse are skipped with a warning; they can never match a
// validated route requirement anyway.
fn parse_codes(raw: Vec<String>) -> Vec<PermissionCode> {
    raw.into_iter()
        .filter_map(|code| match PermissionCode::parse(&code) {
            Ok(code) => Some(code),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed permission code");
                None
            }
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn roles_of(&self, identity_id: Uuid) -> RepoResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT r.id AS role_id, r.role_code, r.name, r.scope,
                   ura.business_id, ura.location_id
            FROM user_role_assignment ura
            JOIN role r ON ura.role_id = r.id
            WHERE ura.user_id = $1
            ORDER BY ura.assigned_at
            "#,
        )
        .bind(identity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }

    async fn permissions_of(&self, role_id: Uuid) -> RepoResult<Vec<PermissionCode>> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.code
            FROM role_permission rp
            JOIN permission p ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(parse_codes(codes))
    }

    async fn permission_codes(&self) -> RepoResult<Vec<PermissionCode>> {
        let codes = sqlx::query_scalar::<_, String>("SELECT code FROM permission ORDER BY code")
            .fetch_all(&self.pool)
            .await?;

        Ok(parse_codes(codes))
    }
}
