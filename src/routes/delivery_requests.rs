// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Skip and reschedule requests and their review.

use crate::db::{collections, Query};
use crate::error::{AppError, Result};
use crate::models::{
    DeliveryRequest, Kitchen, Notification, RequestStatus, RequestType, Role,
};
use crate::routes::{load, new_id};
use crate::services::gate::{authorize, Action};
use crate::services::{audit, Session};
use crate::AppState;
use axum::{
    extract::{Path, Query as QueryParams, State},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/delivery-requests",
            get(list_requests).post(create_request),
        )
        .route("/api/delivery-requests/{id}", put(review_request))
}

#[derive(Deserialize, Validate)]
pub struct CreateRequest {
    #[validate(length(min = 1))]
    subscription_id: String,
    request_type: RequestType,
    original_date: NaiveDate,
    #[serde(default)]
    requested_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 500))]
    reason: String,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<DeliveryRequest>> {
    req.validate()?;
    let sub = state.subscriptions.get_subscription(&req.subscription_id).await?;

    let allowed = if session.role == Role::Customer {
        sub.customer_id == session.user_id
    } else {
        session.permits(Action::ManageAnySubscription)
            || session.permits(Action::ReviewDeliveryRequests)
    };
    if !allowed {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    if req.original_date < state.today() {
        return Err(AppError::BadRequest(
            "Cannot request changes for past dates".to_string(),
        ));
    }
    let requested_date = match (req.request_type, req.requested_date) {
        (RequestType::Reschedule, None) => {
            return Err(AppError::BadRequest(
                "requested_date is required for reschedule".to_string(),
            ));
        }
        (RequestType::Reschedule, date) => date,
        (RequestType::Skip, _) => None,
    };

    let now = state.clock.now();
    let request = DeliveryRequest {
        request_id: new_id("req"),
        subscription_id: sub.subscription_id,
        customer_id: sub.customer_id,
        kitchen_id: sub.kitchen_id,
        request_type: req.request_type,
        original_date: req.original_date,
        requested_date,
        reason: req.reason,
        status: RequestStatus::Pending,
        created_by: session.user_id.clone(),
        reviewed_by: None,
        reviewed_at: None,
        created_at: now,
    };
    let store = state.store.as_ref();
    store
        .put_doc(collections::DELIVERY_REQUESTS, &request.request_id, &request)
        .await?;

    audit::record(
        store,
        &session,
        "create",
        "delivery_request",
        &request.request_id,
        None,
        now,
    )
    .await;
    Ok(Json(request))
}

#[derive(Deserialize)]
struct RequestFilter {
    status: Option<RequestStatus>,
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(filter): QueryParams<RequestFilter>,
) -> Result<Json<Vec<DeliveryRequest>>> {
    let store = state.store.as_ref();
    let mut query = Query::new().eq_opt("status", filter.status.map(RequestStatus::as_str));
    let mut kitchens: Option<BTreeSet<String>> = None;

    match session.role {
        Role::Customer => query = query.eq("customer_id", session.user_id.as_str()),
        Role::CityManager => {
            let city = session.city.clone().unwrap_or_default();
            let in_city: Vec<Kitchen> = store
                .query_docs(collections::KITCHENS, &Query::new().eq("city", city))
                .await?;
            kitchens = Some(in_city.into_iter().map(|k| k.kitchen_id).collect());
        }
        _ => authorize(&session, Action::ReviewDeliveryRequests)?,
    }

    let mut requests: Vec<DeliveryRequest> = store
        .query_docs(collections::DELIVERY_REQUESTS, &query)
        .await?;
    if let Some(ids) = kitchens {
        requests.retain(|r| ids.contains(&r.kitchen_id));
    }
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(requests))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    action: ReviewAction,
}

/// Approve or reject a pending request. Approval applies the change first;
/// the request is only marked approved once the change went through.
async fn review_request(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<DeliveryRequest>> {
    authorize(&session, Action::ReviewDeliveryRequests)?;
    let store = state.store.as_ref();
    let mut request: DeliveryRequest =
        load(store, collections::DELIVERY_REQUESTS, &id, "Request").await?;

    if request.status != RequestStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Request already {}",
            request.status.as_str()
        )));
    }
    if session.role == Role::CityManager {
        let kitchen: Kitchen =
            load(store, collections::KITCHENS, &request.kitchen_id, "Kitchen").await?;
        if session.city.as_deref() != Some(kitchen.city.as_str()) {
            return Err(AppError::Forbidden(
                "Request belongs to another city".to_string(),
            ));
        }
    }

    let (status, message) = match req.action {
        ReviewAction::Approve => {
            match (request.request_type, request.requested_date) {
                (RequestType::Skip, _) => {
                    state
                        .subscriptions
                        .skip_date(
                            &request.subscription_id,
                            request.original_date,
                            &session,
                            &request.reason,
                        )
                        .await?;
                }
                (RequestType::Reschedule, Some(to)) => {
                    state
                        .subscriptions
                        .reschedule(&request.subscription_id, request.original_date, to, &session)
                        .await?;
                }
                (RequestType::Reschedule, None) => {
                    return Err(AppError::BadRequest(
                        "Request has no requested date".to_string(),
                    ));
                }
            }
            (
                RequestStatus::Approved,
                format!("Your request for {} was approved", request.original_date),
            )
        }
        ReviewAction::Reject => (
            RequestStatus::Rejected,
            format!("Your request for {} was declined", request.original_date),
        ),
    };

    let now = state.clock.now();
    request.status = status;
    request.reviewed_by = Some(session.user_id.clone());
    request.reviewed_at = Some(now);
    store
        .put_doc(collections::DELIVERY_REQUESTS, &id, &request)
        .await?;

    let notification = Notification::new(
        &request.customer_id,
        "delivery_request_reviewed",
        "Delivery request update",
        message,
        now,
    );
    if let Err(e) = store
        .put_doc(
            collections::NOTIFICATIONS,
            &notification.notification_id,
            &notification,
        )
        .await
    {
        tracing::warn!(error = %e, request_id = %id, "Failed to notify customer");
    }

    audit::record(
        store,
        &session,
        status.as_str(),
        "delivery_request",
        &id,
        None,
        now,
    )
    .await;
    Ok(Json(request))
}
