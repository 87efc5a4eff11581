/*
 * Responsibility
 * - Authorization pipeline: keys -> token -> identity -> permissions -> decision -> audit
 * - Session ledger (login/logout bookkeeping, outside the gate)
 */
pub mod audit;
pub mod auth;
pub mod catalog;
pub mod gate;
pub mod identity;
pub mod keys;
pub mod permissions;
pub mod session;

pub use audit::AuditSink;
pub use catalog::{CatalogError, PermissionCatalog};
pub use gate::{Authorization, AuthorizationGate, Principal};
pub use identity::{IdentityResolver, ResolveError};
pub use permissions::{AggregateError, Aggregation, PermissionAggregator};
pub use session::{CloseOutcome, LedgerError, SessionLedger, SessionMeta};
