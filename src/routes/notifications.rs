// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The caller's in-app notifications.

use crate::db::{collections, ChangeSet, Query};
use crate::error::{AppError, Result};
use crate::models::Notification;
use crate::routes::auth::MessageResponse;
use crate::services::Session;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use std::sync::Arc;

const MAX_NOTIFICATIONS: u32 = 100;
/// Firestore caps a commit at 500 writes.
const MARK_READ_CHUNK: usize = 400;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", put(mark_all_read))
        .route("/api/notifications/{id}/read", put(mark_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Notification>>> {
    let query = Query::new()
        .eq("user_id", session.user_id.as_str())
        .order_desc("created_at")
        .limit(MAX_NOTIFICATIONS);
    Ok(Json(
        state
            .store
            .query_docs(collections::NOTIFICATIONS, &query)
            .await?,
    ))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Notification>> {
    let store = state.store.as_ref();
    let mut notification: Notification = store
        .get_doc(collections::NOTIFICATIONS, &id)
        .await?
        .filter(|n: &Notification| n.user_id == session.user_id)
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    if !notification.is_read {
        notification.is_read = true;
        store
            .put_doc(collections::NOTIFICATIONS, &id, &notification)
            .await?;
    }
    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MessageResponse>> {
    let store = state.store.as_ref();
    let query = Query::new()
        .eq("user_id", session.user_id.as_str())
        .eq("is_read", false);
    let unread: Vec<Notification> = store.query_docs(collections::NOTIFICATIONS, &query).await?;

    for chunk in unread.chunks(MARK_READ_CHUNK) {
        let mut changes = ChangeSet::new();
        for notification in chunk {
            let mut read = notification.clone();
            read.is_read = true;
            changes.put(collections::NOTIFICATIONS, &read.notification_id, &read)?;
        }
        store.commit(changes).await?;
    }

    tracing::debug!(user_id = %session.user_id, count = unread.len(), "Notifications marked read");
    Ok(Json(MessageResponse {
        message: format!("{} notifications marked as read", unread.len()),
    }))
}
