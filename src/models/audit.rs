//! Audit trail entries.

use crate::models::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuditLog {
    pub log_id: String,
    pub actor_id: String,
    pub actor_role: Role,
    pub action: String,
    pub entity: String,
    pub entity_id: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}
