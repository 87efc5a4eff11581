use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::model::Identity;
use crate::repos::{IdentityStore, RepoError, bounded};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no identity for subject")]
    NotFound,
    #[error("identity store unavailable")]
    Unavailable(#[source] RepoError),
}

/// Maps a verified subject to the local identity record. Lookup only.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn resolve(&self, subject: &str) -> Result<Identity, ResolveError> {
        bounded(self.timeout, self.store.find_by_external_subject(subject))
            .await
            .map_err(ResolveError::Unavailable)?
            .ok_or(ResolveError::NotFound)
    }

    pub async fn by_id(&self, id: Uuid) -> Result<Identity, ResolveError> {
        bounded(self.timeout, self.store.find_by_id(id))
            .await
            .map_err(ResolveError::Unavailable)?
            .ok_or(ResolveError::NotFound)
    }
}
