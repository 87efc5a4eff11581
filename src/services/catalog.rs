/*
 * Responsibility
 * - Known permission codes, loaded once at startup
 * - Route requirements are validated against it while the router is built
 */
use std::collections::BTreeSet;
use std::time::Duration;

use thiserror::Error;

use crate::model::{InvalidPermissionCode, PermissionCode, RequiredPermission};
use crate::repos::{RepoError, RoleStore, bounded};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Invalid(#[from] InvalidPermissionCode),
    #[error("route requires unknown permission {0}")]
    Unknown(PermissionCode),
}

#[derive(Debug, Clone, Default)]
pub struct PermissionCatalog {
    codes: BTreeSet<PermissionCode>,
}

impl PermissionCatalog {
    pub fn new(codes: impl IntoIterator<Item = PermissionCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }

    pub async fn load(store: &dyn RoleStore, timeout: Duration) -> Result<Self, RepoError> {
        let codes = bounded(timeout, store.permission_codes()).await?;
        tracing::info!(permissions = codes.len(), "permission catalog loaded");
        Ok(Self::new(codes))
    }

    /// Parse a route requirement; `""` is authenticated-only.
    pub fn require(&self, raw: &str) -> Result<RequiredPermission, CatalogError> {
        match RequiredPermission::parse(raw)? {
            RequiredPermission::Code(code) if !self.codes.contains(&code) => {
                Err(CatalogError::Unknown(code))
            }
            required => Ok(required),
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
