// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kitchen directory routes.

use crate::db::{collections, Query, Store};
use crate::error::{AppError, Result};
use crate::models::{GeoPoint, Kitchen};
use crate::routes::{load, new_id};
use crate::services::gate::{authorize, Action};
use crate::services::{audit, Session};
use crate::AppState;
use axum::{
    extract::{Path, Query as QueryParams, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/kitchens", get(list_kitchens))
        .route("/api/kitchens/{id}", get(get_kitchen))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/kitchens", axum::routing::post(create_kitchen))
        .route("/api/kitchens/{id}", put(update_kitchen).delete(deactivate_kitchen))
}

#[derive(Deserialize)]
struct KitchenFilter {
    city: Option<String>,
    #[serde(default)]
    include_inactive: bool,
}

async fn list_kitchens(
    State(state): State<Arc<AppState>>,
    QueryParams(filter): QueryParams<KitchenFilter>,
) -> Result<Json<Vec<Kitchen>>> {
    let mut query = Query::new().eq_opt("city", filter.city);
    if !filter.include_inactive {
        query = query.eq("is_active", true);
    }
    let mut kitchens: Vec<Kitchen> = state
        .store
        .query_docs(collections::KITCHENS, &query)
        .await?;
    kitchens.sort_by(|a, b| (&a.city, &a.name).cmp(&(&b.city, &b.name)));
    Ok(Json(kitchens))
}

async fn get_kitchen(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Kitchen>> {
    Ok(Json(
        load(state.store.as_ref(), collections::KITCHENS, &id, "Kitchen").await?,
    ))
}

#[derive(Deserialize, Validate)]
pub struct KitchenRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 1, max = 50))]
    city: String,
    #[validate(length(min = 1, max = 300))]
    address: String,
    #[serde(default)]
    location: Option<GeoPoint>,
    #[validate(length(min = 8, max = 15))]
    contact_phone: String,
    #[serde(default)]
    is_active: Option<bool>,
}

/// Reject a second kitchen with the same name in one city.
async fn ensure_unique_name(
    store: &dyn Store,
    city: &str,
    name: &str,
    except: Option<&str>,
) -> Result<()> {
    let same_city: Vec<Kitchen> = store
        .query_docs(collections::KITCHENS, &Query::new().eq("city", city))
        .await?;
    let taken = same_city.iter().any(|k| {
        k.name.eq_ignore_ascii_case(name) && Some(k.kitchen_id.as_str()) != except
    });
    if taken {
        return Err(AppError::BadRequest(format!(
            "A kitchen named '{}' already exists in {}",
            name, city
        )));
    }
    Ok(())
}

fn checked_location(location: Option<GeoPoint>) -> Result<Option<GeoPoint>> {
    match location {
        Some(point) if !point.is_valid() => {
            Err(AppError::BadRequest("Location is out of range".to_string()))
        }
        other => Ok(other),
    }
}

async fn create_kitchen(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<KitchenRequest>,
) -> Result<Json<Kitchen>> {
    authorize(&session, Action::ManageKitchens)?;
    req.validate()?;
    let store = state.store.as_ref();
    let name = req.name.trim().to_string();
    let city = req.city.trim().to_string();
    ensure_unique_name(store, &city, &name, None).await?;

    let now = state.clock.now();
    let kitchen = Kitchen {
        kitchen_id: new_id("kitchen"),
        name,
        city,
        address: req.address,
        location: checked_location(req.location)?,
        contact_phone: req.contact_phone,
        is_active: req.is_active.unwrap_or(true),
        created_at: now,
    };
    store
        .put_doc(collections::KITCHENS, &kitchen.kitchen_id, &kitchen)
        .await?;

    audit::record(store, &session, "create", "kitchen", &kitchen.kitchen_id, None, now).await;
    tracing::info!(kitchen_id = %kitchen.kitchen_id, city = %kitchen.city, "Kitchen created");
    Ok(Json(kitchen))
}

async fn update_kitchen(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<KitchenRequest>,
) -> Result<Json<Kitchen>> {
    authorize(&session, Action::ManageKitchens)?;
    req.validate()?;
    let store = state.store.as_ref();
    let mut kitchen: Kitchen = load(store, collections::KITCHENS, &id, "Kitchen").await?;

    let name = req.name.trim().to_string();
    let city = req.city.trim().to_string();
    ensure_unique_name(store, &city, &name, Some(&id)).await?;

    kitchen.name = name;
    kitchen.city = city;
    kitchen.address = req.address;
    kitchen.location = checked_location(req.location)?;
    kitchen.contact_phone = req.contact_phone;
    if let Some(active) = req.is_active {
        kitchen.is_active = active;
    }
    store.put_doc(collections::KITCHENS, &id, &kitchen).await?;

    audit::record(store, &session, "update", "kitchen", &id, None, state.clock.now()).await;
    Ok(Json(kitchen))
}

/// Soft delete: the kitchen stays referenced by its history.
async fn deactivate_kitchen(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Kitchen>> {
    authorize(&session, Action::ManageKitchens)?;
    let store = state.store.as_ref();
    let mut kitchen: Kitchen = load(store, collections::KITCHENS, &id, "Kitchen").await?;
    kitchen.is_active = false;
    store.put_doc(collections::KITCHENS, &id, &kitchen).await?;

    audit::record(store, &session, "deactivate", "kitchen", &id, None, state.clock.now()).await;
    tracing::info!(kitchen_id = %id, "Kitchen deactivated");
    Ok(Json(kitchen))
}
