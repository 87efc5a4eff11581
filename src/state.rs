/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Cheap to clone (everything behind Arc)
 */
use std::sync::Arc;

use crate::services::{AuthorizationGate, SessionLedger};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub sessions: Arc<SessionLedger>,
}

impl AppState {
    pub fn new(gate: Arc<AuthorizationGate>, sessions: Arc<SessionLedger>) -> Self {
        Self { gate, sessions }
    }
}
