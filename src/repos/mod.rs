/*
 * Responsibility
 * - Store traits consumed by the services
 * - Postgres (sqlx) implementations and the in-memory backend
 */
pub mod audit_repo;
pub mod error;
pub mod identity_repo;
pub mod memory;
pub mod role_repo;
pub mod session_repo;

pub use audit_repo::{AuditEntry, AuditStore, PgAuditStore};
pub use error::{RepoError, RepoResult, bounded};
pub use identity_repo::{IdentityStore, PgIdentityStore};
pub use memory::{InMemoryStore, Seed, SeedError};
pub use role_repo::{PgRoleStore, RoleStore};
pub use session_repo::{PgSessionStore, SessionStore};
