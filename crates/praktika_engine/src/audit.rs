//! Audit sink.
//!
//! Outcome events are appended fire-and-forget: the engine never blocks on
//! the sink and never propagates its failures. The default sink writes
//! structured tracing events; deployments wire their own implementation.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// One appended outcome event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at: DateTime<Utc>,
    /// Acting user, where one exists
    pub actor: Option<Uuid>,
    /// Machine-readable action name ("reserve_booking", "certify", ...)
    pub action: String,
    /// "ok" or a denial code
    pub outcome: String,
    pub data: serde_json::Value,
}

impl AuditEvent {
    pub fn new(actor: Option<Uuid>, action: &str, outcome: &str, data: serde_json::Value) -> Self {
        Self {
            at: Utc::now(),
            actor,
            action: action.to_string(),
            outcome: outcome.to_string(),
            data,
        }
    }
}

/// Append-only audit consumer. Called strictly outside any row lock.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Default sink: structured tracing events under the `praktika::audit`
/// target.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "praktika::audit",
            action = %event.action,
            outcome = %event.outcome,
            actor = ?event.actor,
            "audit event"
        );
    }
}
