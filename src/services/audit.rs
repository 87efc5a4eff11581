use std::sync::Arc;
use std::time::Duration;

use crate::model::{Decision, Outcome};
use crate::repos::{AuditEntry, AuditStore, bounded};

pub const ACTION_GRANTED: &str = "PERMISSION_GRANTED";
pub const ACTION_DENIED: &str = "PERMISSION_DENIED";

/// Records every gate decision. A failed write is logged and otherwise ignored;
/// the decision it describes stands.
#[derive(Clone)]
pub struct AuditSink {
    store: Arc<dyn AuditStore>,
    timeout: Duration,
}

impl AuditSink {
    pub fn new(store: Arc<dyn AuditStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns whether the entry was persisted.
    pub async fn record(&self, decision: &Decision) -> bool {
        let entry = entry_for(decision);

        match bounded(self.timeout, self.store.record(&entry)).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    outcome = decision.outcome.as_str(),
                    path = %decision.path,
                    "audit write failed, decision stands unrecorded"
                );
                false
            }
        }
    }
}

pub fn entry_for(decision: &Decision) -> AuditEntry {
    let required = &decision.required_permission;
    let path = &decision.path;

    let (action, details) = match decision.outcome {
        Outcome::Allow => (ACTION_GRANTED, format!("Granted {required} on {path}")),
        Outcome::DenyInsufficientPermission => {
            (ACTION_DENIED, format!("Denied {required} on {path}"))
        }
        Outcome::DenyNoRoles => (
            ACTION_DENIED,
            format!("No roles/permissions for {required} on {path} ({})", decision.reason),
        ),
        Outcome::DenyNoToken | Outcome::DenyInvalidToken => (
            ACTION_DENIED,
            format!(
                "{} for {required} on {path} ({})",
                decision.outcome.as_str(),
                decision.reason
            ),
        ),
    };

    AuditEntry {
        identity_id: decision.identity_id,
        action,
        details,
        created_at: decision.timestamp,
    }
}
