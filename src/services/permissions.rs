/*
 * Responsibility
 * - identity -> role assignments -> permissions of each role -> union
 * - per-role lookups run concurrently; any failure fails the whole aggregation
 */
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

use crate::model::{PermissionSet, RoleAssignment};
use crate::repos::{RepoError, RoleStore, bounded};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("role store unavailable")]
    Store(#[from] RepoError),
    #[error("permission lookup task failed")]
    Task(#[from] JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// The identity holds no role assignment at all.
    NoRoles,
    /// Roles exist; `permissions` may still be empty.
    Granted {
        roles: Vec<RoleAssignment>,
        permissions: PermissionSet,
    },
}

#[derive(Clone)]
pub struct PermissionAggregator {
    store: Arc<dyn RoleStore>,
    timeout: Duration,
}

impl PermissionAggregator {
    pub fn new(store: Arc<dyn RoleStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn permissions_for(&self, identity_id: Uuid) -> Result<Aggregation, AggregateError> {
        let roles = bounded(self.timeout, self.store.roles_of(identity_id)).await?;
        if roles.is_empty() {
            return Ok(Aggregation::NoRoles);
        }

        // A role assigned for several businesses is looked up once.
        let role_ids: BTreeSet<Uuid> = roles.iter().map(|a| a.role.id).collect();

        // Dropping the set (early return, abandoned request) aborts outstanding lookups.
        let mut lookups = JoinSet::new();
        for role_id in role_ids {
            let store = Arc::clone(&self.store);
            let timeout = self.timeout;
            lookups.spawn(async move { bounded(timeout, store.permissions_of(role_id)).await });
        }

        let mut permissions = PermissionSet::new();
        while let Some(joined) = lookups.join_next().await {
            permissions.extend(joined??);
        }

        Ok(Aggregation::Granted { roles, permissions })
    }
}
