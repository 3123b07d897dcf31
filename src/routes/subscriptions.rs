// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription routes: creation, listing, pause/resume and cancellation.

use crate::db::{collections, Query};
use crate::error::{AppError, Result};
use crate::models::{GeoPoint, Kitchen, Plan, Role, Subscription, SubscriptionStatus, User};
use crate::routes::{load, new_id};
use crate::services::gate::{authorize, Action};
use crate::services::ledger::{NewSubscription, PlanSelection};
use crate::services::lifecycle::LifecycleError;
use crate::services::{audit, Session};
use crate::AppState;
use axum::{
    extract::{Path, Query as QueryParams, State},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/api/subscriptions/{id}", get(get_subscription))
        .route("/api/subscriptions/{id}/pause", put(pause))
        .route("/api/subscriptions/{id}/resume", put(resume))
        .route("/api/subscriptions/{id}/cancel", put(cancel))
}

/// Whether `session` may read `sub`.
fn can_view(session: &Session, sub: &Subscription) -> bool {
    match session.role {
        Role::Customer => sub.customer_id == session.user_id,
        Role::KitchenManager => session.owns_kitchen(&sub.kitchen_id),
        _ => session.permits(Action::ViewAllSubscriptions),
    }
}

/// Whether `session` may pause or resume `sub`.
fn can_manage(session: &Session, sub: &Subscription) -> bool {
    if session.role == Role::Customer {
        sub.customer_id == session.user_id
    } else {
        session.permits(Action::ManageAnySubscription)
    }
}

// ─── Reads ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct SubscriptionFilter {
    status: Option<SubscriptionStatus>,
    #[serde(alias = "user_id")]
    customer_id: Option<String>,
    kitchen_id: Option<String>,
}

async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(filter): QueryParams<SubscriptionFilter>,
) -> Result<Json<Vec<Subscription>>> {
    let (customer_id, kitchen_id) = match session.role {
        Role::Customer => (Some(session.user_id.clone()), filter.kitchen_id),
        Role::KitchenManager => (filter.customer_id, session.kitchen_id.clone()),
        _ => {
            authorize(&session, Action::ViewAllSubscriptions)?;
            (filter.customer_id, filter.kitchen_id)
        }
    };
    if session.role == Role::KitchenManager && kitchen_id.is_none() {
        return Ok(Json(vec![]));
    }

    let query = Query::new()
        .eq_opt("customer_id", customer_id)
        .eq_opt("kitchen_id", kitchen_id)
        .eq_opt("status", filter.status.map(SubscriptionStatus::as_str));
    let mut subs: Vec<Subscription> = state
        .store
        .query_docs(collections::SUBSCRIPTIONS, &query)
        .await?;
    subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(subs))
}

async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Subscription>> {
    let sub = state.subscriptions.get_subscription(&id).await?;
    if !can_view(&session, &sub) {
        // Do not reveal other customers' subscriptions.
        return Err(AppError::NotFound("Subscription not found".to_string()));
    }
    Ok(Json(sub))
}

// ─── Creation ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    #[serde(default, alias = "user_id")]
    customer_id: Option<String>,
    #[validate(length(min = 1))]
    kitchen_id: String,
    #[serde(default)]
    plan_id: Option<String>,
    #[serde(flatten)]
    plan: PlanSelection,
    start_date: NaiveDate,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    amount: Option<f64>,
    #[serde(default)]
    #[validate(length(min = 1, max = 300))]
    address: Option<String>,
    #[serde(default)]
    location: Option<GeoPoint>,
    #[serde(default)]
    #[validate(length(max = 500))]
    allergy_notes: Option<String>,
}

async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<Json<Subscription>> {
    authorize(&session, Action::CreateSubscription)?;
    req.validate()?;
    let store = state.store.as_ref();

    let customer_id = match (session.role, req.customer_id) {
        (Role::Customer, Some(id)) if id != session.user_id => {
            return Err(AppError::Forbidden(
                "Customers can only subscribe for themselves".to_string(),
            ));
        }
        (Role::Customer, _) => session.user_id.clone(),
        (_, Some(id)) => id,
        (_, None) => {
            return Err(AppError::BadRequest("customer_id is required".to_string()));
        }
    };
    let customer: User = load(store, collections::USERS, &customer_id, "Customer").await?;
    if customer.role != Role::Customer || !customer.is_active {
        return Err(AppError::BadRequest(
            "Subscriptions can only be created for active customers".to_string(),
        ));
    }

    let kitchen: Kitchen = load(store, collections::KITCHENS, &req.kitchen_id, "Kitchen").await?;
    if !kitchen.is_active {
        return Err(AppError::BadRequest("Kitchen is not active".to_string()));
    }

    let mut amount = req.amount;
    if let Some(plan_id) = &req.plan_id {
        let plan: Plan = load(store, collections::PLANS, plan_id, "Plan").await?;
        if !plan.is_active
            || plan.plan_type != req.plan.plan_type
            || plan.diet_type != req.plan.diet_type
        {
            return Err(LifecycleError::InvalidPlan(format!(
                "Selection does not match catalog plan {}",
                plan.name
            ))
            .into());
        }
        amount = Some(plan.price);
    }

    let address = req
        .address
        .or_else(|| customer.address.clone())
        .ok_or_else(|| AppError::BadRequest("Delivery address is required".to_string()))?;
    let location = match req.location {
        Some(point) if !point.is_valid() => {
            return Err(AppError::BadRequest("Location is out of range".to_string()));
        }
        Some(point) => Some(point),
        None => customer.google_location,
    };
    let allergy_notes = req.allergy_notes.or_else(|| {
        customer
            .profile
            .as_ref()
            .and_then(|p| p.allergy_notes())
    });

    let (sub, deliveries) = state
        .subscriptions
        .create(NewSubscription {
            subscription_id: new_id("sub"),
            customer_id,
            kitchen_id: kitchen.kitchen_id,
            plan_id: req.plan_id,
            plan: req.plan,
            start_date: req.start_date,
            amount,
            address,
            location,
            allergy_notes,
        })
        .await?;

    audit::record(
        store,
        &session,
        "create",
        "subscription",
        &sub.subscription_id,
        Some(format!("deliveries={}", deliveries.len())),
        state.clock.now(),
    )
    .await;
    Ok(Json(sub))
}

// ─── Pause / resume / cancel ─────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct DatesRequest {
    #[validate(length(min = 1, max = 60))]
    dates: Vec<NaiveDate>,
}

async fn pause(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<DatesRequest>,
) -> Result<Json<Subscription>> {
    req.validate()?;
    let sub = state.subscriptions.get_subscription(&id).await?;
    if !can_manage(&session, &sub) {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    let sub = state.subscriptions.pause(&id, &req.dates).await?;
    audit::record(
        state.store.as_ref(),
        &session,
        "pause",
        "subscription",
        &id,
        Some(format!("dates={}", req.dates.len())),
        state.clock.now(),
    )
    .await;
    Ok(Json(sub))
}

async fn resume(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<DatesRequest>,
) -> Result<Json<Subscription>> {
    req.validate()?;
    let sub = state.subscriptions.get_subscription(&id).await?;
    if !can_manage(&session, &sub) {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    let sub = state.subscriptions.resume(&id, &req.dates).await?;
    audit::record(
        state.store.as_ref(),
        &session,
        "resume",
        "subscription",
        &id,
        Some(format!("dates={}", req.dates.len())),
        state.clock.now(),
    )
    .await;
    Ok(Json(sub))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Subscription>> {
    authorize(&session, Action::CancelSubscription)?;
    let sub = state.subscriptions.cancel_subscription(&id, &session).await?;
    audit::record(
        state.store.as_ref(),
        &session,
        "cancel",
        "subscription",
        &id,
        None,
        state.clock.now(),
    )
    .await;
    Ok(Json(sub))
}
