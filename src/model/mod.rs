/*
 * Responsibility
 * - Domain types shared by repos, services and handlers
 * - No I/O here; stores convert their rows into these types
 */
pub mod decision;
pub mod identity;
pub mod rbac;
pub mod session;

pub use decision::{Decision, Outcome, reason};
pub use identity::{Identity, IdentityStatus};
pub use rbac::{
    InvalidPermissionCode, Permission, PermissionCode, PermissionSet, RequiredPermission, Role,
    RoleAssignment, RoleScope,
};
pub use session::{NewSession, Session};
