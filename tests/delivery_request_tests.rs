// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Skip and reschedule requests filed by customers and reviewed by staff.

use axum::http::StatusCode;
use foodfleet::models::{Role, User};
use serde_json::{json, Value};

mod common;
use common::TestApp;

struct Fixture {
    app: TestApp,
    customer: User,
    city_manager: User,
    subscription_id: String,
}

/// Customer with a lunch subscription starting Monday 2 March 2026.
async fn fixture(plan_type: &str) -> Fixture {
    let app = common::create_test_app();
    app.seed_kitchen("kit_1", "Kochi").await;
    let customer = app.seed_user("cust_1", Role::Customer, None).await;
    let city_manager = app.seed_user("cm_1", Role::CityManager, None).await;

    let (status, sub) = app
        .post(
            "/api/subscriptions",
            &customer,
            json!({
                "kitchen_id": "kit_1",
                "plan_type": plan_type,
                "diet_type": "veg",
                "meal_periods": ["lunch"],
                "start_date": "2026-03-02"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "create failed: {sub}");

    Fixture {
        subscription_id: sub["subscription_id"].as_str().unwrap().to_string(),
        app,
        customer,
        city_manager,
    }
}

impl Fixture {
    async fn file(&self, user: &User, body: Value) -> (StatusCode, Value) {
        let mut body = body;
        body["subscription_id"] = json!(self.subscription_id);
        self.app.post("/api/delivery-requests", user, body).await
    }

    async fn review(&self, user: &User, id: &str, action: &str) -> (StatusCode, Value) {
        self.app
            .put(
                &format!("/api/delivery-requests/{id}"),
                user,
                json!({ "action": action }),
            )
            .await
    }

    async fn live_dates(&self) -> Vec<String> {
        let (_, deliveries) = self
            .app
            .get(
                &format!("/api/deliveries?subscription_id={}", self.subscription_id),
                &self.customer,
            )
            .await;
        deliveries
            .as_array()
            .unwrap()
            .iter()
            .filter(|d| d["status"] != "cancelled")
            .map(|d| d["delivery_date"].as_str().unwrap().to_string())
            .collect()
    }

    async fn subscription(&self) -> Value {
        let (_, sub) = self
            .app
            .get(
                &format!("/api/subscriptions/{}", self.subscription_id),
                &self.customer,
            )
            .await;
        sub
    }
}

#[tokio::test]
async fn test_approved_skip_cancels_and_extends() {
    let f = fixture("weekly").await;

    let (status, request) = f
        .file(
            &f.customer,
            json!({
                "request_type": "skip",
                "original_date": "2026-03-04",
                "requested_date": "2026-03-09",
                "reason": "Travelling"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["status"], "pending");
    // Skips never carry a target date.
    assert!(request["requested_date"].is_null());
    let id = request["request_id"].as_str().unwrap();

    let (status, body) = f.review(&f.customer, id, "approve").await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, reviewed) = f.review(&f.city_manager, id, "approve").await;
    assert_eq!(status, StatusCode::OK, "{reviewed}");
    assert_eq!(reviewed["status"], "approved");
    assert_eq!(reviewed["reviewed_by"], "cm_1");

    let dates = f.live_dates().await;
    assert!(!dates.contains(&"2026-03-04".to_string()));
    assert!(dates.contains(&"2026-03-09".to_string()));
    let sub = f.subscription().await;
    assert_eq!(sub["end_date"], "2026-03-09");
    assert_eq!(sub["extended_deliveries"], 1);

    let (status, body) = f.review(&f.city_manager, id, "reject").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Request already approved");

    let (_, notifications) = f.app.get("/api/notifications", &f.customer).await;
    assert!(notifications
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["kind"] == "delivery_request_reviewed"));
}

#[tokio::test]
async fn test_approved_reschedule_moves_delivery() {
    // Monthly lunch: 24 deliveries fill every working day through 28 March,
    // leaving Monday 30 and Tuesday 31 free.
    let f = fixture("monthly").await;
    let admin = f.app.seed_user("admin_1", Role::Admin, None).await;

    let (status, occupied) = f
        .file(
            &f.customer,
            json!({
                "request_type": "reschedule",
                "original_date": "2026-03-04",
                "requested_date": "2026-03-05",
                "reason": "Office party"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // The target slot is taken, so approval fails and the request stays open.
    let id = occupied["request_id"].as_str().unwrap();
    let (status, _) = f.review(&admin, id, "approve").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, pending) = f
        .app
        .get("/api/delivery-requests?status=pending", &admin)
        .await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    let (status, rejected) = f.review(&admin, id, "reject").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");

    let (_, request) = f
        .file(
            &f.customer,
            json!({
                "request_type": "reschedule",
                "original_date": "2026-03-04",
                "requested_date": "2026-03-30",
                "reason": "Office party"
            }),
        )
        .await;
    let id = request["request_id"].as_str().unwrap();
    let (status, reviewed) = f.review(&admin, id, "approve").await;
    assert_eq!(status, StatusCode::OK, "{reviewed}");

    let dates = f.live_dates().await;
    assert_eq!(dates.len(), 24);
    assert!(!dates.contains(&"2026-03-04".to_string()));
    assert!(dates.contains(&"2026-03-30".to_string()));

    // Moving a meal is not a cancellation.
    let sub = f.subscription().await;
    assert_eq!(sub["end_date"], "2026-03-31");
    assert_eq!(sub["extended_deliveries"], 0);
}

#[tokio::test]
async fn test_request_validation() {
    let f = fixture("weekly").await;
    let stranger = f.app.seed_user("cust_2", Role::Customer, None).await;
    let skip = json!({
        "request_type": "skip",
        "original_date": "2026-03-04",
        "reason": "Travelling"
    });

    let (status, _) = f.file(&stranger, skip.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut past = skip.clone();
    past["original_date"] = json!("2026-02-27");
    let (status, _) = f.file(&f.customer, past).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut no_target = skip.clone();
    no_target["request_type"] = json!("reschedule");
    let (status, body) = f.file(&f.customer, no_target).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "requested_date is required for reschedule");

    let mut no_reason = skip;
    no_reason["reason"] = json!("");
    let (status, _) = f.file(&f.customer, no_reason).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_listing_scopes() {
    let f = fixture("weekly").await;
    let stranger = f.app.seed_user("cust_2", Role::Customer, None).await;
    let mut far_manager = f.app.seed_user("cm_2", Role::CityManager, None).await;
    far_manager.city = Some("Trivandrum".to_string());
    f.app.put_user(&far_manager).await;
    let rider = f
        .app
        .seed_user("boy_1", Role::DeliveryBoy, Some("kit_1"))
        .await;

    let (status, _) = f
        .file(
            &f.customer,
            json!({ "request_type": "skip", "original_date": "2026-03-06", "reason": "Away" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let count = |body: &Value| body.as_array().unwrap().len();
    let (_, mine) = f.app.get("/api/delivery-requests", &f.customer).await;
    assert_eq!(count(&mine), 1);
    let (_, others) = f.app.get("/api/delivery-requests", &stranger).await;
    assert_eq!(count(&others), 0);
    let (_, local) = f.app.get("/api/delivery-requests", &f.city_manager).await;
    assert_eq!(count(&local), 1);
    let (_, remote) = f.app.get("/api/delivery-requests", &far_manager).await;
    assert_eq!(count(&remote), 0);
    let (status, _) = f.app.get("/api/delivery-requests", &rider).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A manager from another city cannot decide it either.
    let id = mine[0]["request_id"].as_str().unwrap();
    let (status, _) = f.review(&far_manager, id, "approve").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
