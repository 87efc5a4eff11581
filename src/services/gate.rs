/*
 * Responsibility
 * - Per-request decision: token -> identity -> permissions -> required check
 * - Every terminal decision goes to the audit sink before returning
 * - Dependency failures fail closed (reason = dependency_unavailable)
 */
use chrono::Utc;
use uuid::Uuid;

use crate::model::{
    Decision, Identity, Outcome, PermissionSet, RequiredPermission, RoleAssignment, reason,
};
use crate::services::audit::AuditSink;
use crate::services::auth::{TokenError, TokenVerifier};
use crate::services::identity::{IdentityResolver, ResolveError};
use crate::services::permissions::{Aggregation, PermissionAggregator};

/// Caller context handed to handlers on ALLOW.
#[derive(Debug, Clone)]
pub struct Principal {
    pub identity: Identity,
    pub roles: Vec<RoleAssignment>,
    pub permissions: PermissionSet,
    /// `exp` of the presented token (unix seconds).
    pub token_expires_at: u64,
}

#[derive(Debug, Clone)]
pub struct Authorization {
    pub decision: Decision,
    /// Present only when the outcome is ALLOW.
    pub principal: Option<Principal>,
}

struct Verdict {
    outcome: Outcome,
    reason: &'static str,
    identity_id: Option<Uuid>,
    principal: Option<Principal>,
}

impl Verdict {
    fn deny(outcome: Outcome, reason: &'static str, identity_id: Option<Uuid>) -> Self {
        Self {
            outcome,
            reason,
            identity_id,
            principal: None,
        }
    }
}

fn token_reason(err: &TokenError) -> &'static str {
    match err {
        TokenError::Malformed => reason::MALFORMED,
        TokenError::MissingAlg => reason::MISSING_ALG,
        TokenError::UnsupportedAlgorithm(_) => reason::UNSUPPORTED_ALGORITHM,
        TokenError::MissingKeyId => reason::MISSING_KEY_ID,
        TokenError::UnknownKey(_) => reason::UNKNOWN_KEY,
        TokenError::InvalidSignature => reason::INVALID_SIGNATURE,
        TokenError::Expired => reason::EXPIRED,
        TokenError::InvalidClaims(_) => reason::INVALID_CLAIMS,
        TokenError::MissingSubject => reason::MISSING_SUBJECT,
    }
}

pub struct AuthorizationGate {
    verifier: TokenVerifier,
    identities: IdentityResolver,
    permissions: PermissionAggregator,
    audit: AuditSink,
}

impl AuthorizationGate {
    pub fn new(
        verifier: TokenVerifier,
        identities: IdentityResolver,
        permissions: PermissionAggregator,
        audit: AuditSink,
    ) -> Self {
        Self {
            verifier,
            identities,
            permissions,
            audit,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    pub async fn authorize(
        &self,
        token: Option<&str>,
        required: &RequiredPermission,
        path: &str,
    ) -> Authorization {
        let verdict = self.evaluate(token, required, path).await;

        let decision = Decision {
            identity_id: verdict.identity_id,
            required_permission: required.clone(),
            outcome: verdict.outcome,
            reason: verdict.reason,
            path: path.to_string(),
            timestamp: Utc::now(),
        };

        match decision.outcome {
            Outcome::Allow => tracing::info!(
                identity_id = ?decision.identity_id,
                required = %required,
                path,
                "access granted"
            ),
            Outcome::DenyNoToken => tracing::info!(path, "request without bearer token"),
            outcome => tracing::warn!(
                identity_id = ?decision.identity_id,
                outcome = outcome.as_str(),
                reason = decision.reason,
                required = %required,
                path,
                "access denied"
            ),
        }

        self.audit.record(&decision).await;

        Authorization {
            decision,
            principal: verdict.principal,
        }
    }

    async fn evaluate(
        &self,
        token: Option<&str>,
        required: &RequiredPermission,
        path: &str,
    ) -> Verdict {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Verdict::deny(Outcome::DenyNoToken, reason::NO_TOKEN, None);
        };

        let verified = match self.verifier.verify(token).await {
            Ok(v) => v,
            Err(err) => {
                tracing::debug!(error = %err, path, "token rejected");
                return Verdict::deny(Outcome::DenyInvalidToken, token_reason(&err), None);
            }
        };

        let identity = match self.identities.resolve(&verified.subject).await {
            Ok(identity) => identity,
            Err(ResolveError::NotFound) => {
                return Verdict::deny(Outcome::DenyInvalidToken, reason::IDENTITY_NOT_FOUND, None);
            }
            Err(ResolveError::Unavailable(err)) => {
                tracing::error!(error = %err, path, "identity lookup failed");
                return Verdict::deny(
                    Outcome::DenyInvalidToken,
                    reason::DEPENDENCY_UNAVAILABLE,
                    None,
                );
            }
        };

        if !identity.is_active() {
            return Verdict::deny(
                Outcome::DenyInvalidToken,
                reason::IDENTITY_DISABLED,
                Some(identity.id),
            );
        }

        let (roles, permissions) = match self.permissions.permissions_for(identity.id).await {
            Ok(Aggregation::NoRoles) => {
                return Verdict::deny(Outcome::DenyNoRoles, reason::NO_ROLES, Some(identity.id));
            }
            Ok(Aggregation::Granted { roles, permissions }) => (roles, permissions),
            Err(err) => {
                tracing::error!(error = %err, identity_id = %identity.id, path, "permission lookup failed");
                return Verdict::deny(
                    Outcome::DenyNoRoles,
                    reason::DEPENDENCY_UNAVAILABLE,
                    Some(identity.id),
                );
            }
        };

        // Roles that grant nothing are treated like no roles at all.
        if permissions.is_empty() {
            return Verdict::deny(
                Outcome::DenyNoRoles,
                reason::ROLES_WITHOUT_PERMISSIONS,
                Some(identity.id),
            );
        }

        if !required.is_satisfied_by(&permissions) {
            return Verdict::deny(
                Outcome::DenyInsufficientPermission,
                reason::INSUFFICIENT_PERMISSION,
                Some(identity.id),
            );
        }

        Verdict {
            outcome: Outcome::Allow,
            reason: reason::GRANTED,
            identity_id: Some(identity.id),
            principal: Some(Principal {
                identity,
                roles,
                permissions,
                token_expires_at: verified.expires_at,
            }),
        }
    }
}
