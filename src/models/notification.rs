//! In-app notifications.

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
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    /// Machine tag such as `delivery_dispatched`.
    pub kind: String,
    #[serde(default)]
    pub delivery_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: &str,
        kind: &str,
        title: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            notification_id: format!("ntf_{}", uuid::Uuid::new_v4().simple()),
            user_id: user_id.to_string(),
            title: title.into(),
            message: message.into(),
            kind: kind.to_string(),
            delivery_id: None,
            is_read: false,
            created_at: now,
        }
    }

    pub fn for_delivery(mut self, delivery_id: &str) -> Self {
        self.delivery_id = Some(delivery_id.to_string());
        self
    }
}
