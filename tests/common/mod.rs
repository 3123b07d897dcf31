// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::{NaiveDate, NaiveDateTime};
use foodfleet::config::Config;
use foodfleet::db::{collections, FirestoreStore, MemoryStore, Store};
use foodfleet::middleware::auth::create_jwt;
use foodfleet::models::{Kitchen, Role, User};
use foodfleet::routes::create_router;
use foodfleet::services::passwords::hash_password;
use foodfleet::time_utils::{Clock, FixedClock};
use foodfleet::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Kitchen clock offset used by every test app (IST).
#[allow(dead_code)]
pub const OFFSET_MINUTES: i32 = 330;

#[allow(dead_code)]
pub const PASSWORD: &str = "secret-password";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a store connected to the emulator.
#[allow(dead_code)]
pub async fn test_store() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

#[allow(dead_code)]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[allow(dead_code)]
pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

/// A router over an in-memory store with a settable kitchen clock.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: Arc<dyn Store>,
    pub clock: Arc<FixedClock>,
}

/// Create a test app whose clock reads `now` in kitchen-local time.
#[allow(dead_code)]
pub fn create_test_app_at(now: NaiveDateTime) -> TestApp {
    let config = Config::test_default();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::at_local(now, OFFSET_MINUTES));
    let state = Arc::new(
        AppState::new(config, store.clone(), clock.clone())
            .expect("Failed to build application state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        clock,
    }
}

/// Sunday 1 March 2026, 18:00 kitchen time.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_at(local(2026, 3, 1, 18, 0))
}

#[allow(dead_code)]
impl TestApp {
    /// Move the kitchen clock.
    pub fn set_local_time(&self, now: NaiveDateTime) {
        self.clock
            .set(FixedClock::at_local(now, OFFSET_MINUTES).now());
    }

    pub async fn seed_kitchen(&self, id: &str, city: &str) -> Kitchen {
        let kitchen = Kitchen {
            kitchen_id: id.to_string(),
            name: format!("Kitchen {id}"),
            city: city.to_string(),
            address: "1 Market Road".to_string(),
            location: None,
            contact_phone: "04842000000".to_string(),
            is_active: true,
            created_at: self.clock.now(),
        };
        self.store
            .put_doc(collections::KITCHENS, id, &kitchen)
            .await
            .unwrap();
        kitchen
    }

    /// Store an active user with [`PASSWORD`] as password.
    pub async fn seed_user(&self, id: &str, role: Role, kitchen: Option<&str>) -> User {
        let user = User {
            user_id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            phone: None,
            name: format!("User {id}"),
            picture: None,
            role,
            kitchen_id: kitchen.map(str::to_string),
            city: (role == Role::CityManager).then(|| "Kochi".to_string()),
            address: Some("12 MG Road".to_string()),
            google_location: None,
            profile: None,
            password_hash: Some(
                hash_password(&self.state.config.password_pepper, PASSWORD).unwrap(),
            ),
            must_change_password: false,
            is_active: true,
            created_at: self.clock.now(),
        };
        self.put_user(&user).await;
        user
    }

    pub async fn put_user(&self, user: &User) {
        self.store
            .put_doc(collections::USERS, &user.user_id, user)
            .await
            .unwrap();
    }

    pub fn token_for(&self, user: &User) -> String {
        create_jwt(
            user,
            &self.state.config.jwt_signing_key,
            self.state.config.session_ttl_days,
            self.clock.now(),
        )
        .unwrap()
    }

    /// Send a JSON request, optionally as `user`, and decode the JSON reply.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token_for(user)),
            );
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &User) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &User, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &User, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(user), Some(body)).await
    }
}
