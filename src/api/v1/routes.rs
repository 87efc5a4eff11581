/*
 * Responsibility
 * - v1 URL structure
 * - Which sub-router is gated on which permission (validated against the catalog)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    me::me,
    protected::protected,
    public::public,
    sessions::{create_session, logout},
};
use crate::middleware::auth::access;
use crate::services::{CatalogError, PermissionCatalog};
use crate::state::AppState;

pub fn routes(state: AppState, catalog: &PermissionCatalog) -> Result<Router<AppState>, CatalogError> {
    let authenticated = Router::new()
        .route("/me", get(me))
        .route("/sessions", post(create_session));
    let authenticated = access::apply(authenticated, state.clone(), catalog.require("")?);

    let admin = Router::new().route("/protected", get(protected));
    let admin = access::apply(admin, state, catalog.require("MANAGE_USERS")?);

    Ok(Router::new()
        .route("/public", get(public))
        // Logout trusts the ledger, not the gate: an expired token must still close its session.
        .route("/logout", post(logout))
        .merge(authenticated)
        .merge(admin))
}
