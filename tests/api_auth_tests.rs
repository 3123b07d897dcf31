// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, session and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid sessions
//! 2. Login sets an HttpOnly session cookie that authenticates later calls
//! 3. Staff with a pending password change are held at the change screen
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use foodfleet::models::Role;
use serde_json::json;
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = common::create_test_app();
    let (status, body) = app
        .send(Method::GET, "/api/auth/me", None, None)
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_rejected() {
    let app = common::create_test_app();
    let mut user = app.seed_user("cust_1", Role::Customer, None).await;

    user.is_active = false;
    app.put_user(&user).await;

    let (status, body) = app.get("/api/auth/me", &user).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = common::create_test_app();
    app.seed_user("km_1", Role::KitchenManager, Some("kit_1")).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "email": "KM_1@example.com", "password": common::PASSWORD })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    let user: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(user["role"], "kitchen_manager");
    assert!(user.get("password_hash").is_none());

    // The cookie alone authenticates.
    let token = cookie
        .split(';')
        .next()
        .unwrap()
        .trim_start_matches("session_token=");
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, format!("session_token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = common::create_test_app();
    app.seed_user("cust_1", Role::Customer, None).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "cust_1@example.com", "password": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid credentials");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "password": "nope" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_phone_signup_always_creates_customer() {
    let app = common::create_test_app();
    let body = json!({
        "phone": "9876543210",
        "name": "Anu",
        "password": "hunter22",
        "role": "super_admin"
    });

    let (status, user) = app
        .send(Method::POST, "/api/auth/phone-signup", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "customer");

    let (status, body) = app
        .send(Method::POST, "/api/auth/phone-signup", None, Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Phone already registered");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "phone": "9876543210", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_change_required_blocks_api() {
    let app = common::create_test_app();
    let mut staff = app.seed_user("sales_1", Role::SalesExecutive, None).await;
    staff.must_change_password = true;
    app.put_user(&staff).await;

    let (status, body) = app.get("/api/subscriptions", &staff).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "password_change_required");

    // /auth/me stays reachable so the client can route to the change form.
    let (status, me) = app.get("/api/auth/me", &staff).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["must_change_password"], true);

    let (status, _) = app
        .post(
            "/api/auth/change-password",
            &staff,
            json!({ "current_password": "wrong-one", "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = app
        .post(
            "/api/auth/change-password",
            &staff,
            json!({ "current_password": common::PASSWORD, "new_password": "brand-new-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["must_change_password"], false);

    let (status, _) = app.get("/api/subscriptions", &staff).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let app = common::create_test_app();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_session_expiry_follows_app_clock() {
    let app = common::create_test_app();
    let customer = app.seed_user("cust_1", Role::Customer, None).await;
    let token = app.token_for(&customer);

    let me = |token: String| {
        app.router.clone().oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
    };

    // Issued on 1 March 2026 kitchen time with a seven-day lifetime.
    let response = me(token.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.set_local_time(common::local(2026, 3, 7, 18, 0));
    let response = me(token.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.set_local_time(common::local(2026, 3, 8, 18, 0));
    let response = me(token).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/subscriptions")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn test_public_routes_no_auth_required() {
    let app = common::create_test_app();

    for uri in ["/health", "/api/constants", "/api/plans", "/api/kitchens", "/api/banners"] {
        let (status, _) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
}

#[tokio::test]
async fn test_gate_decisions() {
    let app = common::create_test_app();
    let rider = app
        .seed_user("boy_1", Role::DeliveryBoy, Some("kit_1"))
        .await;

    let (_, decision) = app
        .send(Method::GET, "/api/gate?path=/admin", None, None)
        .await;
    assert_eq!(
        decision,
        json!({ "action": "login", "to": "/login", "from": "/admin" })
    );

    let (_, decision) = app.get("/api/gate?path=/admin", &rider).await;
    assert_eq!(decision, json!({ "action": "redirect", "to": "/delivery" }));

    let (_, decision) = app.get("/api/gate?path=/delivery", &rider).await;
    assert_eq!(decision, json!({ "action": "allow" }));
}
