//! Bearer token -> AuthorizationGate decision -> AuthCtx in request extensions
//!
//! - Each guarded sub-router carries its own required permission.
//! - DENY never reaches the handler; the decision is mapped to 401/403
//!   (503 when the gate failed closed on a dependency).

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::model::{Decision, Outcome, RequiredPermission};
use crate::state::AppState;

#[derive(Clone)]
struct Guard {
    state: AppState,
    required: RequiredPermission,
}

/// Gate every route of `router` on `required`.
///
/// ```ignore
/// let admin = Router::new().route("/protected", get(protected));
/// let admin = middleware::auth::access::apply(admin, state.clone(), catalog.require("MANAGE_USERS")?);
/// ```
pub fn apply(
    router: Router<AppState>,
    state: AppState,
    required: RequiredPermission,
) -> Router<AppState> {
    // route_layer: unmatched paths still 404 instead of 401
    router.route_layer(middleware::from_fn_with_state(
        Guard { state, required },
        access_middleware,
    ))
}

/// `Authorization: Bearer <token>`; any other shape counts as no token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn access_middleware(
    State(guard): State<Guard>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).map(str::to_owned);

    let authorization = guard
        .state
        .gate
        .authorize(token.as_deref(), &guard.required, original_uri.path())
        .await;

    let Some(principal) = authorization.principal else {
        return Err(rejection(&authorization.decision));
    };

    // middleware -> extractor
    req.extensions_mut().insert(AuthCtx::from(principal));

    Ok(next.run(req).await)
}

fn rejection(decision: &Decision) -> AppError {
    if decision.is_dependency_failure() {
        return AppError::ServiceUnavailable;
    }

    match decision.outcome {
        Outcome::DenyNoToken => AppError::unauthorized("MISSING_TOKEN", "Missing token"),
        Outcome::DenyInvalidToken => AppError::unauthorized("INVALID_TOKEN", "Invalid token"),
        Outcome::DenyNoRoles => AppError::forbidden("NO_ROLES", "Role not selected for user"),
        Outcome::DenyInsufficientPermission => {
            AppError::forbidden("INSUFFICIENT_PERMISSION", "Insufficient permissions")
        }
        // ALLOW always carries a principal.
        Outcome::Allow => AppError::Internal,
    }
}
