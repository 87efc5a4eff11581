/*
 * Responsibility
 * - In-process implementation of every store trait (tests, STORE_BACKEND=memory)
 * - Seed loading from a JSON document
 *
 * One RwLock guards the whole state so that session open (deactivate + insert)
 * happens under a single write guard, the in-memory analogue of a transaction.
 *
 * Audit entries and closed sessions are retained up to a fixed count, oldest
 * dropped first; a long-running dev server does not grow without bound.
 */
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{
    Identity, NewSession, Permission, PermissionCode, Role, RoleAssignment, Session,
};
use crate::repos::audit_repo::{AuditEntry, AuditStore};
use crate::repos::error::RepoResult;
use crate::repos::identity_repo::IdentityStore;
use crate::repos::role_repo::RoleStore;
use crate::repos::session_repo::SessionStore;

/// Initial data for the memory backend.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub identities: Vec<Identity>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub roles: Vec<SeedRole>,
    #[serde(default)]
    pub assignments: Vec<SeedAssignment>,
}

#[derive(Debug, Deserialize)]
pub struct SeedRole {
    #[serde(flatten)]
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<PermissionCode>,
}

#[derive(Debug, Deserialize)]
pub struct SeedAssignment {
    pub identity_id: Uuid,
    pub role_id: Uuid,
    #[serde(default)]
    pub business_id: Option<Uuid>,
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("assignment references unknown role {0}")]
    UnknownRole(Uuid),
}

impl Seed {
    pub fn from_path(path: &Path) -> Result<Self, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Default)]
struct State {
    identities: HashMap<Uuid, Identity>,
    roles: HashMap<Uuid, Role>,
    assignments: HashMap<Uuid, Vec<RoleAssignment>>,
    role_permissions: HashMap<Uuid, Vec<PermissionCode>>,
    catalog: BTreeSet<PermissionCode>,
    sessions: Vec<Session>,
    audit: VecDeque<AuditEntry>,
}

const DEFAULT_RETENTION: usize = 10_000;

#[derive(Debug)]
pub struct InMemoryStore {
    state: RwLock<State>,
    retention: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

// Drop the oldest inactive sessions beyond `limit`; active ones always stay.
fn prune_closed(sessions: &mut Vec<Session>, limit: usize) {
    let mut excess = sessions.len().saturating_sub(limit);
    sessions.retain(|s| {
        if excess > 0 && !s.active {
            excess -= 1;
            false
        } else {
            true
        }
    });
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` audit entries and closed sessions.
    pub fn with_retention(limit: usize) -> Self {
        Self {
            state: RwLock::new(State::default()),
            retention: limit,
        }
    }

    pub fn from_seed(seed: Seed) -> Result<Self, SeedError> {
        let mut state = State::default();

        for identity in seed.identities {
            state.identities.insert(identity.id, identity);
        }
        for permission in seed.permissions {
            state.catalog.insert(permission.code);
        }
        for SeedRole { role, permissions } in seed.roles {
            state.catalog.extend(permissions.iter().cloned());
            state.role_permissions.insert(role.id, permissions);
            state.roles.insert(role.id, role);
        }
        for a in seed.assignments {
            let role = state
                .roles
                .get(&a.role_id)
                .cloned()
                .ok_or(SeedError::UnknownRole(a.role_id))?;
            state
                .assignments
                .entry(a.identity_id)
                .or_default()
                .push(RoleAssignment {
                    role,
                    business_id: a.business_id,
                    location_id: a.location_id,
                });
        }

        Ok(Self {
            state: RwLock::new(state),
            retention: DEFAULT_RETENTION,
        })
    }

    pub async fn add_identity(&self, identity: Identity) {
        self.state
            .write()
            .await
            .identities
            .insert(identity.id, identity);
    }

    /// Register a role with its permission codes; codes join the catalog.
    pub async fn add_role(&self, role: Role, permissions: Vec<PermissionCode>) {
        let mut state = self.state.write().await;
        state.catalog.extend(permissions.iter().cloned());
        state.role_permissions.insert(role.id, permissions);
        state.roles.insert(role.id, role);
    }

    /// Assign a registered role globally. Unknown roles are ignored.
    pub async fn assign(&self, identity_id: Uuid, role_id: Uuid) {
        let mut state = self.state.write().await;
        let Some(role) = state.roles.get(&role_id).cloned() else {
            return;
        };
        state
            .assignments
            .entry(identity_id)
            .or_default()
            .push(RoleAssignment {
                role,
                business_id: None,
                location_id: None,
            });
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.read().await.audit.iter().cloned().collect()
    }

    pub async fn sessions_of(&self, identity_id: Uuid) -> Vec<Session> {
        self.state
            .read()
            .await
            .sessions
            .iter()
            .filter(|s| s.identity_id == identity_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_by_external_subject(&self, subject: &str) -> RepoResult<Option<Identity>> {
        let state = self.state.read().await;
        Ok(state
            .identities
            .values()
            .find(|i| i.external_subject == subject)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> RepoResult<Option<Identity>> {
        Ok(self.state.read().await.identities.get(&id).cloned())
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn roles_of(&self, identity_id: Uuid) -> RepoResult<Vec<RoleAssignment>> {
        let state = self.state.read().await;
        Ok(state
            .assignments
            .get(&identity_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn permissions_of(&self, role_id: Uuid) -> RepoResult<Vec<PermissionCode>> {
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .get(&role_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn permission_codes(&self) -> RepoResult<Vec<PermissionCode>> {
        Ok(self.state.read().await.catalog.iter().cloned().collect())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn open_session(&self, new: NewSession) -> RepoResult<Session> {
        let mut state = self.state.write().await;

        // Racing opens read the clock before the lock; login order follows lock order.
        let login_at = state
            .sessions
            .iter()
            .filter(|s| s.identity_id == new.identity_id && s.active)
            .map(|s| s.login_at)
            .fold(new.login_at, |latest, at| latest.max(at));

        for s in state
            .sessions
            .iter_mut()
            .filter(|s| s.identity_id == new.identity_id && s.active)
        {
            s.active = false;
            s.logout_at = Some(login_at);
        }

        let session = Session {
            id: Uuid::new_v4(),
            identity_id: new.identity_id,
            login_at,
            logout_at: None,
            access_token_hash: new.access_token_hash,
            refresh_token_hash: new.refresh_token_hash,
            expires_at: new.expires_at,
            ip_address: new.ip_address,
            user_agent: new.user_agent,
            active: true,
        };
        state.sessions.push(session.clone());
        prune_closed(&mut state.sessions, self.retention);

        Ok(session)
    }

    async fn latest_by_token_hash(&self, token_hash: &[u8]) -> RepoResult<Option<Session>> {
        let state = self.state.read().await;
        // max_by_key keeps the last maximum, so later pushes win ties on login_at.
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.access_token_hash == token_hash)
            .max_by_key(|s| s.login_at)
            .cloned())
    }

    async fn close_session(&self, token_hash: &[u8], at: DateTime<Utc>) -> RepoResult<bool> {
        let mut state = self.state.write().await;
        let mut closed = false;
        for s in state
            .sessions
            .iter_mut()
            .filter(|s| s.access_token_hash == token_hash && s.active)
        {
            s.active = false;
            s.logout_at = Some(at);
            closed = true;
        }
        Ok(closed)
    }
}

#[async_trait]
impl AuditStore for InMemoryStore {
    async fn record(&self, entry: &AuditEntry) -> RepoResult<()> {
        let mut state = self.state.write().await;
        state.audit.push_back(entry.clone());
        while state.audit.len() > self.retention {
            state.audit.pop_front();
        }
        Ok(())
    }
}
