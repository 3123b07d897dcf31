// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Delivery routes: role-scoped listings and the lifecycle operations.

use crate::db::{collections, Query, Store};
use crate::error::{AppError, Result};
use crate::models::{Delivery, DeliveryStatus, GeoPoint, Kitchen, Role, User, UserResponse};
use crate::routes::load;
use crate::services::gate::{authorize, Action};
use crate::services::{audit, Session};
use crate::AppState;
use axum::{
    extract::{Path, Query as QueryParams, State},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/deliveries", get(list_deliveries))
        .route("/api/deliveries/today", get(today_deliveries))
        .route("/api/deliveries/{id}", get(get_delivery))
        .route("/api/deliveries/{id}/status", put(update_status))
        .route("/api/deliveries/{id}/assign", put(assign))
        .route("/api/deliveries/{id}/cancel", put(cancel))
        .route("/api/deliveries/{id}/location", put(update_location))
}

/// Delivery with the customer it is addressed to.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeliveryView {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub customer: Option<UserResponse>,
}

// ─── Scoping ─────────────────────────────────────────────────

/// Which deliveries a caller can see.
enum Scope {
    All,
    Customer(String),
    DeliveryBoy(String),
    Kitchens(BTreeSet<String>),
}

async fn scope_for(store: &dyn Store, session: &Session) -> Result<Scope> {
    let scope = match session.role {
        Role::Customer => Scope::Customer(session.user_id.clone()),
        Role::DeliveryBoy => Scope::DeliveryBoy(session.user_id.clone()),
        Role::KitchenManager => Scope::Kitchens(session.kitchen_id.iter().cloned().collect()),
        Role::CityManager => {
            let city = session.city.clone().unwrap_or_default();
            let kitchens: Vec<Kitchen> = store
                .query_docs(collections::KITCHENS, &Query::new().eq("city", city))
                .await?;
            Scope::Kitchens(kitchens.into_iter().map(|k| k.kitchen_id).collect())
        }
        _ => {
            authorize(session, Action::ViewAllSubscriptions)?;
            Scope::All
        }
    };
    Ok(scope)
}

impl Scope {
    fn allows(&self, delivery: &Delivery) -> bool {
        match self {
            Scope::All => true,
            Scope::Customer(id) => delivery.customer_id == *id,
            Scope::DeliveryBoy(id) => delivery.delivery_boy_id.as_deref() == Some(id.as_str()),
            Scope::Kitchens(ids) => ids.contains(&delivery.kitchen_id),
        }
    }

    /// Narrow a query to this scope where the store can filter directly.
    fn narrow(&self, query: Query) -> Query {
        match self {
            Scope::Customer(id) => query.eq("customer_id", id.as_str()),
            Scope::DeliveryBoy(id) => query.eq("delivery_boy_id", id.as_str()),
            Scope::Kitchens(ids) if ids.len() == 1 => {
                query.eq_opt("kitchen_id", ids.iter().next().map(String::as_str))
            }
            _ => query,
        }
    }
}

#[derive(Deserialize, Default)]
struct DeliveryFilter {
    date: Option<NaiveDate>,
    kitchen_id: Option<String>,
    delivery_boy_id: Option<String>,
    #[serde(alias = "customer_id")]
    user_id: Option<String>,
    subscription_id: Option<String>,
    status: Option<DeliveryStatus>,
}

/// Run a filtered, scoped query and attach customers.
async fn find_deliveries(
    store: &dyn Store,
    scope: &Scope,
    filter: DeliveryFilter,
) -> Result<Vec<DeliveryView>> {
    let query = Query::new()
        .eq_opt("delivery_date", filter.date.map(|d| d.to_string()))
        .eq_opt("kitchen_id", filter.kitchen_id)
        .eq_opt("delivery_boy_id", filter.delivery_boy_id)
        .eq_opt("customer_id", filter.user_id)
        .eq_opt("subscription_id", filter.subscription_id)
        .eq_opt("status", filter.status.map(DeliveryStatus::as_str));
    let query = scope.narrow(query);

    let mut deliveries: Vec<Delivery> = store.query_docs(collections::DELIVERIES, &query).await?;
    deliveries.retain(|d| scope.allows(d));
    deliveries.sort_by(|a, b| {
        (a.delivery_date, a.meal_period, &a.delivery_id)
            .cmp(&(b.delivery_date, b.meal_period, &b.delivery_id))
    });

    with_customers(store, deliveries).await
}

async fn with_customers(store: &dyn Store, deliveries: Vec<Delivery>) -> Result<Vec<DeliveryView>> {
    let ids: Vec<String> = deliveries
        .iter()
        .map(|d| d.customer_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let customers: HashMap<String, UserResponse> = store
        .get_many::<User>(collections::USERS, &ids)
        .await?
        .into_iter()
        .map(|u| (u.user_id.clone(), UserResponse::from(u)))
        .collect();

    Ok(deliveries
        .into_iter()
        .map(|delivery| DeliveryView {
            customer: customers.get(&delivery.customer_id).cloned(),
            delivery,
        })
        .collect())
}

// ─── Reads ───────────────────────────────────────────────────

async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(filter): QueryParams<DeliveryFilter>,
) -> Result<Json<Vec<DeliveryView>>> {
    let store = state.store.as_ref();
    let scope = scope_for(store, &session).await?;
    Ok(Json(find_deliveries(store, &scope, filter).await?))
}

#[derive(Deserialize)]
struct TodayFilter {
    kitchen_id: Option<String>,
}

/// Today's run sheet for kitchen and delivery staff.
async fn today_deliveries(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(filter): QueryParams<TodayFilter>,
) -> Result<Json<Vec<DeliveryView>>> {
    authorize(&session, Action::ViewKitchenDeliveries)?;
    let store = state.store.as_ref();
    let scope = scope_for(store, &session).await?;
    let filter = DeliveryFilter {
        date: Some(state.today()),
        kitchen_id: filter.kitchen_id,
        ..Default::default()
    };
    Ok(Json(find_deliveries(store, &scope, filter).await?))
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<DeliveryView>> {
    let store = state.store.as_ref();
    let delivery: Delivery = load(store, collections::DELIVERIES, &id, "Delivery").await?;
    let scope = scope_for(store, &session).await?;
    // A kitchen's delivery partners may open any of its deliveries.
    let same_kitchen = session.role == Role::DeliveryBoy
        && session.kitchen_id.as_deref() == Some(delivery.kitchen_id.as_str());
    if !scope.allows(&delivery) && !same_kitchen {
        return Err(AppError::NotFound("Delivery not found".to_string()));
    }
    let mut views = with_customers(store, vec![delivery]).await?;
    views
        .pop()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Delivery not found".to_string()))
}

// ─── Lifecycle ───────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StatusRequest {
    status: DeliveryStatus,
    #[serde(default)]
    reason: Option<String>,
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Delivery>> {
    let delivery = if req.status == DeliveryStatus::Cancelled {
        state
            .subscriptions
            .cancel_delivery(&id, &session, req.reason)
            .await?
    } else {
        state.subscriptions.advance(&id, req.status, &session).await?
    };

    audit::record(
        state.store.as_ref(),
        &session,
        "update_status",
        "delivery",
        &id,
        Some(format!("status={}", delivery.status)),
        state.clock.now(),
    )
    .await;
    Ok(Json(delivery))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    delivery_boy_id: String,
}

async fn assign(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<Delivery>> {
    authorize(&session, Action::AssignDelivery)?;
    let store = state.store.as_ref();
    let boy: User = load(store, collections::USERS, &req.delivery_boy_id, "Delivery partner").await?;

    let delivery = state.subscriptions.assign(&id, &boy, &session).await?;
    audit::record(
        store,
        &session,
        "assign",
        "delivery",
        &id,
        Some(format!("delivery_boy_id={}", boy.user_id)),
        state.clock.now(),
    )
    .await;
    Ok(Json(delivery))
}

#[derive(Deserialize, Validate, Default)]
pub struct CancelRequest {
    #[serde(default)]
    #[validate(length(max = 500))]
    reason: Option<String>,
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Delivery>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;

    let delivery = state
        .subscriptions
        .cancel_delivery(&id, &session, req.reason)
        .await?;
    audit::record(
        state.store.as_ref(),
        &session,
        "cancel",
        "delivery",
        &id,
        None,
        state.clock.now(),
    )
    .await;
    Ok(Json(delivery))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(point): Json<GeoPoint>,
) -> Result<Json<Delivery>> {
    Ok(Json(
        state
            .subscriptions
            .update_location(&id, point, &session)
            .await?,
    ))
}
