// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User directory routes: staff provisioning, customer accounts and health
//! profiles.

use crate::db::{collections, Query, Store};
use crate::error::{AppError, Result};
use crate::models::{GeoPoint, HealthProfile, Kitchen, Role, User, UserResponse};
use crate::routes::auth::find_user_by;
use crate::routes::{load, new_id};
use crate::services::gate::{authorize, Action};
use crate::services::passwords::{self, MIN_PASSWORD_LEN};
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

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        .route("/api/users/{id}/profile", put(update_profile))
}

/// The caller may act on `user_id` as themselves or through `action`.
fn self_or(session: &Session, user_id: &str, action: Action) -> Result<()> {
    if session.user_id == user_id {
        Ok(())
    } else {
        authorize(session, action)
    }
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct UserFilter {
    role: Option<Role>,
    kitchen_id: Option<String>,
    city: Option<String>,
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(filter): QueryParams<UserFilter>,
) -> Result<Json<Vec<UserResponse>>> {
    authorize(&session, Action::ViewUsers)?;

    // City managers only see their own city.
    let city = match session.role {
        Role::CityManager => session.city.clone(),
        _ => filter.city,
    };
    let query = Query::new()
        .eq_opt("role", filter.role.map(Role::as_str))
        .eq_opt("kitchen_id", filter.kitchen_id)
        .eq_opt("city", city);

    let mut users: Vec<User> = state.store.query_docs(collections::USERS, &query).await?;
    users.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    self_or(&session, &id, Action::ViewUsers)?;
    let user: User = load(state.store.as_ref(), collections::USERS, &id, "User").await?;
    Ok(Json(user.into()))
}

// ─── Creation ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[serde(default)]
    #[validate(email)]
    email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, max = 15))]
    phone: Option<String>,
    #[serde(default)]
    #[validate(length(min = MIN_PASSWORD_LEN, max = 128))]
    password: Option<String>,
    role: Role,
    #[serde(default)]
    kitchen_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    city: Option<String>,
    #[serde(default)]
    #[validate(length(max = 300))]
    address: Option<String>,
    #[serde(default)]
    google_location: Option<GeoPoint>,
    #[serde(default)]
    profile: Option<HealthProfile>,
}

/// Email and phone are unique across all accounts.
async fn ensure_contact_free(
    store: &dyn Store,
    email: Option<&str>,
    phone: Option<&str>,
    except: Option<&str>,
) -> Result<()> {
    let others = |u: &User| Some(u.user_id.as_str()) != except;
    if let Some(email) = email {
        if find_user_by(store, "email", email).await?.filter(others).is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }
    }
    if let Some(phone) = phone {
        if find_user_by(store, "phone", phone).await?.filter(others).is_some() {
            return Err(AppError::BadRequest("Phone already registered".to_string()));
        }
    }
    Ok(())
}

/// Role-specific binding: kitchen staff need a kitchen, city managers a city.
async fn check_role_binding(
    store: &dyn Store,
    role: Role,
    kitchen_id: Option<&str>,
    city: Option<&str>,
) -> Result<()> {
    if role.requires_kitchen() {
        let kitchen_id = kitchen_id.ok_or_else(|| {
            AppError::BadRequest(format!("kitchen_id is required for {}", role))
        })?;
        let kitchen: Option<Kitchen> = store.get_doc(collections::KITCHENS, kitchen_id).await?;
        if !kitchen.is_some_and(|k| k.is_active) {
            return Err(AppError::BadRequest("Kitchen not found".to_string()));
        }
    }
    if role == Role::CityManager && !city.is_some_and(|c| !c.trim().is_empty()) {
        return Err(AppError::BadRequest(
            "city is required for city_manager".to_string(),
        ));
    }
    Ok(())
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>> {
    let action = if req.role == Role::Customer {
        Action::CreateCustomers
    } else {
        Action::CreateStaff
    };
    authorize(&session, action)?;
    if !session.role.may_create(req.role) {
        tracing::warn!(
            user_id = %session.user_id,
            role = %session.role,
            target = %req.role,
            "Role may not create this role"
        );
        return Err(AppError::Forbidden(format!(
            "Cannot create users with role {}",
            req.role
        )));
    }
    req.validate()?;

    let store = state.store.as_ref();
    let email = req.email.map(|e| e.to_lowercase());
    let phone = req.phone.map(|p| p.trim().to_string());
    if email.is_none() && phone.is_none() {
        return Err(AppError::BadRequest("Email or phone required".to_string()));
    }
    ensure_contact_free(store, email.as_deref(), phone.as_deref(), None).await?;
    check_role_binding(store, req.role, req.kitchen_id.as_deref(), req.city.as_deref()).await?;

    let password_hash = req
        .password
        .as_deref()
        .map(|pw| passwords::hash_password(&state.config.password_pepper, pw))
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;
    let now = state.clock.now();
    let user = User {
        user_id: new_id("user"),
        email,
        phone,
        name: req.name.trim().to_string(),
        picture: None,
        role: req.role,
        kitchen_id: req.kitchen_id.filter(|_| req.role.requires_kitchen()),
        city: req.city,
        address: req.address,
        google_location: req.google_location.filter(GeoPoint::is_valid),
        profile: req.profile.filter(|_| req.role == Role::Customer),
        // Staff given a temporary password must pick their own.
        must_change_password: password_hash.is_some() && req.role != Role::Customer,
        password_hash,
        is_active: true,
        created_at: now,
    };
    store.put_doc(collections::USERS, &user.user_id, &user).await?;

    audit::record(
        store,
        &session,
        "create",
        "user",
        &user.user_id,
        Some(format!("role={}", user.role)),
        now,
    )
    .await;
    tracing::info!(
        user_id = %user.user_id,
        role = %user.role,
        created_by = %session.user_id,
        "User created"
    );
    Ok(Json(user.into()))
}

// ─── Updates ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    name: Option<String>,
    #[serde(default)]
    #[validate(email)]
    email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 8, max = 15))]
    phone: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    city: Option<String>,
    #[serde(default)]
    #[validate(length(max = 300))]
    address: Option<String>,
    #[serde(default)]
    google_location: Option<GeoPoint>,
    #[serde(default)]
    picture: Option<String>,
    // Administrative fields
    #[serde(default)]
    role: Option<Role>,
    #[serde(default)]
    kitchen_id: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>> {
    self_or(&session, &id, Action::ManageUsers)?;
    req.validate()?;
    let store = state.store.as_ref();
    let mut user: User = load(store, collections::USERS, &id, "User").await?;

    let administrative = req.role.is_some() || req.kitchen_id.is_some() || req.is_active.is_some();
    if administrative {
        authorize(&session, Action::ManageUsers)?;
        if let Some(role) = req.role {
            if !session.role.may_create(role) || !session.role.may_create(user.role) {
                return Err(AppError::Forbidden(format!(
                    "Cannot assign role {}",
                    role
                )));
            }
        }
    }

    let email = req.email.map(|e| e.to_lowercase());
    let phone = req.phone.map(|p| p.trim().to_string());
    ensure_contact_free(store, email.as_deref(), phone.as_deref(), Some(&id)).await?;

    if let Some(name) = req.name {
        user.name = name.trim().to_string();
    }
    if email.is_some() {
        user.email = email;
    }
    if phone.is_some() {
        user.phone = phone;
    }
    if req.city.is_some() {
        user.city = req.city;
    }
    if req.address.is_some() {
        user.address = req.address;
    }
    if let Some(point) = req.google_location {
        if !point.is_valid() {
            return Err(AppError::BadRequest("Location is out of range".to_string()));
        }
        user.google_location = Some(point);
    }
    if req.picture.is_some() {
        user.picture = req.picture;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if req.kitchen_id.is_some() {
        user.kitchen_id = req.kitchen_id;
    }
    if let Some(active) = req.is_active {
        if !active && id == session.user_id {
            return Err(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        user.is_active = active;
    }
    check_role_binding(store, user.role, user.kitchen_id.as_deref(), user.city.as_deref()).await?;

    store.put_doc(collections::USERS, &id, &user).await?;
    audit::record(store, &session, "update", "user", &id, None, state.clock.now()).await;
    Ok(Json(user.into()))
}

/// Soft delete: sessions of a deactivated user stop resolving.
async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>> {
    authorize(&session, Action::ManageUsers)?;
    if id == session.user_id {
        return Err(AppError::BadRequest(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    let store = state.store.as_ref();
    let mut user: User = load(store, collections::USERS, &id, "User").await?;
    if !session.role.may_create(user.role) {
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }
    user.is_active = false;
    store.put_doc(collections::USERS, &id, &user).await?;

    audit::record(store, &session, "deactivate", "user", &id, None, state.clock.now()).await;
    tracing::info!(user_id = %id, "User deactivated");
    Ok(Json(user.into()))
}

// ─── Health profile ──────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct ProfileRequest {
    #[serde(default)]
    #[validate(range(min = 1, max = 120))]
    age: Option<u32>,
    #[serde(default)]
    #[validate(length(max = 20))]
    gender: Option<String>,
    #[serde(default)]
    #[validate(range(min = 50.0, max = 250.0))]
    height_cm: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 10.0, max = 300.0))]
    weight_kg: Option<f64>,
    #[serde(default)]
    #[validate(length(max = 30))]
    allergies: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 30))]
    lifestyle_diseases: Vec<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    accommodation_type: Option<String>,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<UserResponse>> {
    self_or(&session, &id, Action::ManageUsers)?;
    req.validate()?;
    let store = state.store.as_ref();
    let mut user: User = load(store, collections::USERS, &id, "User").await?;
    if user.role != Role::Customer {
        return Err(AppError::BadRequest(
            "Health profiles are kept for customers only".to_string(),
        ));
    }

    user.profile = Some(HealthProfile {
        age: req.age,
        gender: req.gender,
        height_cm: req.height_cm,
        weight_kg: req.weight_kg,
        allergies: req.allergies,
        lifestyle_diseases: req.lifestyle_diseases,
        job_type: req.job_type,
        accommodation_type: req.accommodation_type,
    });
    store.put_doc(collections::USERS, &id, &user).await?;

    audit::record(store, &session, "update_profile", "user", &id, None, state.clock.now()).await;
    Ok(Json(user.into()))
}
