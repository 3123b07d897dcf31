//! Append-only audit trail.

use crate::db::{collections, Store};
use crate::models::AuditLog;
use crate::services::gate::Session;
use chrono::{DateTime, Utc};

/// Record a mutating call.
///
/// Failures are logged and swallowed: the audited change has already been
/// committed.
pub async fn record(
    store: &dyn Store,
    session: &Session,
    action: &str,
    entity: &str,
    entity_id: &str,
    detail: Option<String>,
    now: DateTime<Utc>,
) {
    let entry = AuditLog {
        log_id: format!("log_{}", uuid::Uuid::new_v4().simple()),
        actor_id: session.user_id.clone(),
        actor_role: session.role,
        action: action.to_string(),
        entity: entity.to_string(),
        entity_id: entity_id.to_string(),
        detail,
        at: now,
    };
    if let Err(e) = store
        .put_doc(collections::AUDIT_LOGS, &entry.log_id, &entry)
        .await
    {
        tracing::error!(
            error = %e,
            action,
            entity,
            entity_id,
            "Failed to write audit log"
        );
    }
}
