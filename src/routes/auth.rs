// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, sign-up and session routes.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::db::{collections, Query, Store};
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, removal_cookie, session_cookie};
use crate::models::{GeoPoint, Role, User, UserResponse};
use crate::routes::{load, new_id};
use crate::services::passwords::{self, MIN_PASSWORD_LEN};
use crate::services::{audit, Session};
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/phone-signup", post(phone_signup))
        .route("/api/auth/google-session", post(google_session))
        .route("/api/auth/logout", post(logout))
}

/// Session-bound routes; the auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/me", get(get_me))
        .route("/api/auth/change-password", post(change_password))
}

/// Look up a single user by a unique field (`email` or `phone`).
pub(crate) async fn find_user_by(
    store: &dyn Store,
    field: &'static str,
    value: &str,
) -> Result<Option<User>> {
    let mut users: Vec<User> = store
        .query_docs(collections::USERS, &Query::new().eq(field, value).limit(1))
        .await?;
    Ok(users.pop())
}

/// Mint a session for `user` and attach it as a cookie.
fn issue_session(state: &AppState, jar: CookieJar, user: User) -> Result<(CookieJar, Json<UserResponse>)> {
    let token = create_jwt(
        &user,
        &state.config.jwt_signing_key,
        state.config.session_ttl_days,
        state.clock.now(),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let secure = state.config.public_api_url.starts_with("https://");
    let jar = jar.add(session_cookie(token, state.config.session_ttl_days, secure));
    Ok((jar, Json(user.into())))
}

fn hash(state: &AppState, password: &str) -> Result<String> {
    passwords::hash_password(&state.config.password_pepper, password)
        .map_err(|e| AppError::Internal(e.into()))
}

// ─── Login ───────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(email)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[validate(length(min = 1, max = 128))]
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    req.validate()?;

    let user = match (&req.email, &req.phone) {
        (Some(email), _) => find_user_by(state.store.as_ref(), "email", &email.to_lowercase()).await?,
        (None, Some(phone)) => find_user_by(state.store.as_ref(), "phone", phone.trim()).await?,
        (None, None) => {
            return Err(AppError::BadRequest("Email or phone required".to_string()));
        }
    };

    let invalid = || AppError::InvalidCredentials("Invalid credentials".to_string());
    let user = user.ok_or_else(invalid)?;
    let stored = user.password_hash.as_deref().ok_or_else(invalid)?;
    let matches = passwords::verify_password(&state.config.password_pepper, &req.password, stored)
        .unwrap_or_else(|e| {
            tracing::error!(user_id = %user.user_id, error = %e, "Stored password hash unreadable");
            false
        });
    if !matches {
        tracing::info!(user_id = %user.user_id, "Login rejected: wrong password");
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::InvalidCredentials(
            "Account is deactivated".to_string(),
        ));
    }

    tracing::info!(user_id = %user.user_id, role = %user.role, "User logged in");
    issue_session(&state, jar, user)
}

// ─── Phone sign-up ───────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct PhoneSignupRequest {
    #[validate(length(min = 8, max = 15))]
    phone: String,
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = MIN_PASSWORD_LEN, max = 128))]
    password: String,
    #[serde(default)]
    #[validate(email)]
    email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 50))]
    city: Option<String>,
    #[serde(default)]
    #[validate(length(max = 300))]
    address: Option<String>,
    #[serde(default)]
    google_location: Option<GeoPoint>,
}

/// Self sign-up. The account is always a customer, whatever the body says.
async fn phone_signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<PhoneSignupRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    req.validate()?;
    let store = state.store.as_ref();
    let phone = req.phone.trim().to_string();

    if find_user_by(store, "phone", &phone).await?.is_some() {
        return Err(AppError::BadRequest("Phone already registered".to_string()));
    }
    let email = req.email.map(|e| e.to_lowercase());
    if let Some(email) = &email {
        if find_user_by(store, "email", email).await?.is_some() {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }
    }

    let user = User {
        user_id: new_id("user"),
        email,
        phone: Some(phone),
        name: req.name.trim().to_string(),
        picture: None,
        role: Role::Customer,
        kitchen_id: None,
        city: req.city,
        address: req.address,
        google_location: req.google_location.filter(GeoPoint::is_valid),
        profile: None,
        password_hash: Some(hash(&state, &req.password)?),
        must_change_password: false,
        is_active: true,
        created_at: state.clock.now(),
    };
    store.put_doc(collections::USERS, &user.user_id, &user).await?;

    tracing::info!(user_id = %user.user_id, "Customer signed up by phone");
    issue_session(&state, jar, user)
}

// ─── Google session ──────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct GoogleSessionRequest {
    #[validate(length(min = 1, max = 512))]
    session_id: String,
}

async fn google_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<GoogleSessionRequest>,
) -> Result<(CookieJar, Json<UserResponse>)> {
    req.validate()?;
    let profile = state.google_sessions.fetch_profile(&req.session_id).await?;
    let email = profile.email.to_lowercase();
    let store = state.store.as_ref();

    let user = match find_user_by(store, "email", &email).await? {
        Some(mut user) => {
            if !user.is_active {
                return Err(AppError::InvalidCredentials(
                    "Account is deactivated".to_string(),
                ));
            }
            user.name = profile.name;
            user.picture = profile.picture.or(user.picture);
            user
        }
        None => {
            tracing::info!(email = %email, "Creating customer from Google sign-in");
            User {
                user_id: new_id("user"),
                email: Some(email),
                phone: None,
                name: profile.name,
                picture: profile.picture,
                role: Role::Customer,
                kitchen_id: None,
                city: None,
                address: None,
                google_location: None,
                profile: None,
                password_hash: None,
                must_change_password: false,
                is_active: true,
                created_at: state.clock.now(),
            }
        }
    };
    store.put_doc(collections::USERS, &user.user_id, &user).await?;

    tracing::info!(user_id = %user.user_id, role = %user.role, "Google session accepted");
    issue_session(&state, jar, user)
}

// ─── Session ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Always answers with an expired cookie, whether or not one was sent.
async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(removal_cookie()),
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserResponse>> {
    let user: User = load(state.store.as_ref(), collections::USERS, &session.user_id, "User").await?;
    Ok(Json(user.into()))
}

#[derive(Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    current_password: Option<String>,
    #[validate(length(min = MIN_PASSWORD_LEN, max = 128))]
    new_password: String,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<UserResponse>> {
    req.validate()?;
    let store = state.store.as_ref();
    let mut user: User = load(store, collections::USERS, &session.user_id, "User").await?;

    if let Some(stored) = user.password_hash.as_deref() {
        let current = req
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Current password required".to_string()))?;
        let ok = passwords::verify_password(&state.config.password_pepper, current, stored)
            .unwrap_or(false);
        if !ok {
            return Err(AppError::InvalidCredentials(
                "Current password is incorrect".to_string(),
            ));
        }
        if current == req.new_password {
            return Err(AppError::BadRequest(
                "New password must differ from the current one".to_string(),
            ));
        }
    }

    user.password_hash = Some(hash(&state, &req.new_password)?);
    user.must_change_password = false;
    store.put_doc(collections::USERS, &user.user_id, &user).await?;

    let now = state.clock.now();
    audit::record(store, &session, "change_password", "user", &user.user_id, None, now).await;
    tracing::info!(user_id = %user.user_id, "Password changed");
    Ok(Json(user.into()))
}
