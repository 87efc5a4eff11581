mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use access_gate::model::{Outcome, PermissionCode, RequiredPermission, RoleAssignment, reason};
use access_gate::repos::{AuditEntry, AuditStore, RepoError, RepoResult, RoleStore};
use access_gate::services::audit::{ACTION_DENIED, ACTION_GRANTED};
use access_gate::services::auth::build_token_verifier;
use access_gate::services::{
    AuditSink, AuthorizationGate, IdentityResolver, PermissionAggregator,
};
use common::{World, claims, code, config};

fn required(raw: &str) -> RequiredPermission {
    RequiredPermission::parse(raw).unwrap()
}

#[tokio::test]
async fn scenario_admin_is_allowed_what_the_role_grants_only() {
    let world = World::new().await;
    let state = world.state();
    let token = world.key.token_for("u1");

    let allowed = state
        .gate
        .authorize(Some(&token), &required("MANAGE_USERS"), "/api/v1/protected")
        .await;
    assert_eq!(allowed.decision.outcome, Outcome::Allow);
    let principal = allowed.principal.unwrap();
    assert_eq!(principal.identity.id, world.u1.id);
    assert!(principal.permissions.contains(&code("VIEW_AUDIT")));

    let denied = state
        .gate
        .authorize(Some(&token), &required("DELETE_BILLING"), "/api/v1/billing")
        .await;
    assert_eq!(denied.decision.outcome, Outcome::DenyInsufficientPermission);
    assert_eq!(denied.decision.identity_id, Some(world.u1.id));
    assert!(denied.principal.is_none());
}

#[tokio::test]
async fn scenario_identity_without_roles_is_denied_even_when_only_authenticated() {
    let world = World::new().await;
    let state = world.state();
    let token = world.key.token_for("u2");

    let auth = state
        .gate
        .authorize(Some(&token), &RequiredPermission::AuthenticatedOnly, "/api/v1/me")
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyNoRoles);
    assert_eq!(auth.decision.reason, reason::NO_ROLES);

    let auth = state
        .gate
        .authorize(Some(&token), &required("VIEW_AUDIT"), "/api/v1/audit")
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyNoRoles);
}

#[tokio::test]
async fn roles_without_permissions_count_as_no_roles() {
    let world = World::new().await;
    let state = world.state();

    let auth = state
        .gate
        .authorize(
            Some(&world.key.token_for("u3")),
            &RequiredPermission::AuthenticatedOnly,
            "/api/v1/me",
        )
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyNoRoles);
    assert_eq!(auth.decision.reason, reason::ROLES_WITHOUT_PERMISSIONS);
}

#[tokio::test]
async fn missing_token_and_unknown_subject() {
    let world = World::new().await;
    let state = world.state();

    let auth = state
        .gate
        .authorize(None, &RequiredPermission::AuthenticatedOnly, "/api/v1/me")
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyNoToken);

    let auth = state
        .gate
        .authorize(Some("  "), &RequiredPermission::AuthenticatedOnly, "/api/v1/me")
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyNoToken);

    let auth = state
        .gate
        .authorize(
            Some(&world.key.token_for("stranger")),
            &RequiredPermission::AuthenticatedOnly,
            "/api/v1/me",
        )
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyInvalidToken);
    assert_eq!(auth.decision.reason, reason::IDENTITY_NOT_FOUND);
    assert_eq!(auth.decision.identity_id, None);
}

#[tokio::test]
async fn invalid_tokens_carry_their_reason() {
    let world = World::new().await;
    let state = world.state();

    let expired = world.key.sign(&world.key.header(), &claims("u1", -600));
    let auth = state
        .gate
        .authorize(Some(&expired), &required("MANAGE_USERS"), "/api/v1/protected")
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyInvalidToken);
    assert_eq!(auth.decision.reason, reason::EXPIRED);
}

#[tokio::test]
async fn disabled_identity_is_denied() {
    let world = World::new().await;
    let mut disabled = common::identity("gone");
    disabled.status = access_gate::model::IdentityStatus::Disabled;
    world.store.add_identity(disabled.clone()).await;

    let auth = world
        .state()
        .gate
        .authorize(
            Some(&world.key.token_for("gone")),
            &RequiredPermission::AuthenticatedOnly,
            "/api/v1/me",
        )
        .await;
    assert_eq!(auth.decision.outcome, Outcome::DenyInvalidToken);
    assert_eq!(auth.decision.reason, reason::IDENTITY_DISABLED);
    assert_eq!(auth.decision.identity_id, Some(disabled.id));
}

#[tokio::test]
async fn every_decision_is_audited_once() {
    let world = World::new().await;
    let state = world.state();
    let u1 = world.key.token_for("u1");
    let u2 = world.key.token_for("u2");

    let calls: [(Option<&str>, &str); 4] = [
        (Some(u1.as_str()), "MANAGE_USERS"),
        (Some(u1.as_str()), "DELETE_BILLING"),
        (Some(u2.as_str()), ""),
        (None, "MANAGE_USERS"),
    ];
    for (token, req) in calls {
        state.gate.authorize(token, &required(req), "/p").await;
    }

    let entries = world.store.audit_entries().await;
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].action, ACTION_GRANTED);
    assert_eq!(entries[0].details, "Granted MANAGE_USERS on /p");
    assert_eq!(entries[0].identity_id, Some(world.u1.id));
    assert!(entries[1..].iter().all(|e| e.action == ACTION_DENIED));
    assert_eq!(entries[1].details, "Denied DELETE_BILLING on /p");
    assert_eq!(entries[3].identity_id, None);
}

struct BrokenAudit;

#[async_trait]
impl AuditStore for BrokenAudit {
    async fn record(&self, _entry: &AuditEntry) -> RepoResult<()> {
        Err(RepoError::Timeout(Duration::from_millis(1)))
    }
}

#[tokio::test]
async fn audit_failure_does_not_flip_the_outcome() {
    let world = World::new().await;
    let timeout = Duration::from_millis(200);
    let gate = AuthorizationGate::new(
        build_token_verifier(&config(), world.keys.clone()),
        IdentityResolver::new(world.store.clone(), timeout),
        PermissionAggregator::new(world.store.clone(), timeout),
        AuditSink::new(Arc::new(BrokenAudit), timeout),
    );

    let auth = gate
        .authorize(
            Some(&world.key.token_for("u1")),
            &required("MANAGE_USERS"),
            "/api/v1/protected",
        )
        .await;
    assert_eq!(auth.decision.outcome, Outcome::Allow);
}

/// Role store that never answers in time.
struct StalledRoles;

#[async_trait]
impl RoleStore for StalledRoles {
    async fn roles_of(&self, _identity_id: Uuid) -> RepoResult<Vec<RoleAssignment>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    async fn permissions_of(&self, _role_id: Uuid) -> RepoResult<Vec<PermissionCode>> {
        Ok(Vec::new())
    }

    async fn permission_codes(&self) -> RepoResult<Vec<PermissionCode>> {
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn store_timeout_fails_closed() {
    let world = World::new().await;
    let timeout = Duration::from_millis(200);
    let gate = AuthorizationGate::new(
        build_token_verifier(&config(), world.keys.clone()),
        IdentityResolver::new(world.store.clone(), timeout),
        PermissionAggregator::new(Arc::new(StalledRoles), timeout),
        AuditSink::new(world.store.clone(), timeout),
    );

    let auth = gate
        .authorize(
            Some(&world.key.token_for("u1")),
            &required("MANAGE_USERS"),
            "/api/v1/protected",
        )
        .await;

    assert_eq!(auth.decision.outcome, Outcome::DenyNoRoles);
    assert!(auth.decision.is_dependency_failure());
    assert!(auth.principal.is_none());
    assert_eq!(world.store.audit_entries().await.len(), 1);
}

/// World's roles, except that one role's permission lookup fails outright.
struct OneRoleFails {
    inner: Arc<access_gate::repos::InMemoryStore>,
    failing: Uuid,
}

#[async_trait]
impl RoleStore for OneRoleFails {
    async fn roles_of(&self, identity_id: Uuid) -> RepoResult<Vec<RoleAssignment>> {
        self.inner.roles_of(identity_id).await
    }

    async fn permissions_of(&self, role_id: Uuid) -> RepoResult<Vec<PermissionCode>> {
        if role_id == self.failing {
            return Err(RepoError::Timeout(Duration::from_millis(200)));
        }
        self.inner.permissions_of(role_id).await
    }

    async fn permission_codes(&self) -> RepoResult<Vec<PermissionCode>> {
        self.inner.permission_codes().await
    }
}

#[tokio::test]
async fn failed_lookup_for_one_role_denies_instead_of_granting_a_partial_union() {
    let world = World::new().await;
    let auditor = common::role("auditor");
    world
        .store
        .add_role(auditor.clone(), vec![code("VIEW_AUDIT")])
        .await;
    world.store.assign(world.u1.id, auditor.id).await;

    let timeout = Duration::from_millis(200);
    let gate = AuthorizationGate::new(
        build_token_verifier(&config(), world.keys.clone()),
        IdentityResolver::new(world.store.clone(), timeout),
        PermissionAggregator::new(
            Arc::new(OneRoleFails {
                inner: world.store.clone(),
                failing: auditor.id,
            }),
            timeout,
        ),
        AuditSink::new(world.store.clone(), timeout),
    );

    // The admin role alone would grant MANAGE_USERS.
    let auth = gate
        .authorize(
            Some(&world.key.token_for("u1")),
            &required("MANAGE_USERS"),
            "/api/v1/protected",
        )
        .await;

    assert_eq!(auth.decision.outcome, Outcome::DenyNoRoles);
    assert_eq!(auth.decision.reason, reason::DEPENDENCY_UNAVAILABLE);
    assert!(auth.principal.is_none());
}
