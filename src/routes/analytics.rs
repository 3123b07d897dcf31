// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard counters, revenue report and the audit log.

use crate::db::{collections, Query};
use crate::error::{AppError, Result};
use crate::models::{
    AuditLog, Delivery, DeliveryStatus, Kitchen, Role, Subscription, SubscriptionStatus, User,
};
use crate::routes::load;
use crate::services::gate::{authorize, Action};
use crate::services::Session;
use crate::AppState;
use axum::{
    extract::{Path, Query as QueryParams, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_AUDIT_LIMIT: u32 = 100;
const MAX_AUDIT_LIMIT: u32 = 500;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/analytics/admin", get(admin_analytics))
        .route("/api/analytics/kitchen/{id}", get(kitchen_analytics))
        .route("/api/reports/revenue", get(revenue_report))
        .route("/api/audit-logs", get(audit_logs))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AdminAnalytics {
    pub total_kitchens: usize,
    pub total_customers: usize,
    pub total_delivery_staff: usize,
    pub active_subscriptions: usize,
    pub today_deliveries: usize,
}

async fn admin_analytics(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<AdminAnalytics>> {
    authorize(&session, Action::ViewAdminAnalytics)?;
    let store = state.store.as_ref();

    let kitchens: Vec<Kitchen> = store
        .query_docs(collections::KITCHENS, &Query::new().eq("is_active", true))
        .await?;
    let customers: Vec<User> = store
        .query_docs(
            collections::USERS,
            &Query::new().eq("role", Role::Customer.as_str()),
        )
        .await?;
    let riders: Vec<User> = store
        .query_docs(
            collections::USERS,
            &Query::new().eq("role", Role::DeliveryBoy.as_str()),
        )
        .await?;
    let active: Vec<Subscription> = store
        .query_docs(
            collections::SUBSCRIPTIONS,
            &Query::new().eq("status", SubscriptionStatus::Active.as_str()),
        )
        .await?;
    let today: Vec<Delivery> = store
        .query_docs(
            collections::DELIVERIES,
            &Query::new().eq("delivery_date", state.today().to_string()),
        )
        .await?;

    Ok(Json(AdminAnalytics {
        total_kitchens: kitchens.len(),
        total_customers: customers.len(),
        total_delivery_staff: riders.len(),
        active_subscriptions: active.len(),
        today_deliveries: today.len(),
    }))
}

/// Today's deliveries for one kitchen grouped into display buckets.
#[derive(Debug, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct KitchenAnalytics {
    pub total: usize,
    pub pending: usize,
    pub ready: usize,
    pub dispatched: usize,
    pub delivered: usize,
    pub cancelled: usize,
    pub active_subscriptions: usize,
}

impl KitchenAnalytics {
    fn tally(deliveries: &[Delivery]) -> Self {
        let mut stats = Self {
            total: deliveries.len(),
            ..Default::default()
        };
        for delivery in deliveries {
            match delivery.status {
                DeliveryStatus::Scheduled | DeliveryStatus::Preparing => stats.pending += 1,
                DeliveryStatus::Ready => stats.ready += 1,
                DeliveryStatus::Dispatched | DeliveryStatus::InTransit => stats.dispatched += 1,
                DeliveryStatus::Delivered => stats.delivered += 1,
                DeliveryStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }
}

async fn kitchen_analytics(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<KitchenAnalytics>> {
    authorize(&session, Action::ViewKitchenAnalytics)?;
    let store = state.store.as_ref();
    let kitchen: Kitchen = load(store, collections::KITCHENS, &id, "Kitchen").await?;

    let in_scope = match session.role {
        Role::KitchenManager => session.owns_kitchen(&id),
        Role::CityManager => session.city.as_deref() == Some(kitchen.city.as_str()),
        _ => true,
    };
    if !in_scope {
        return Err(AppError::Forbidden("Kitchen is outside your scope".to_string()));
    }

    let deliveries: Vec<Delivery> = store
        .query_docs(
            collections::DELIVERIES,
            &Query::new()
                .eq("kitchen_id", id.as_str())
                .eq("delivery_date", state.today().to_string()),
        )
        .await?;
    let active: Vec<Subscription> = store
        .query_docs(
            collections::SUBSCRIPTIONS,
            &Query::new()
                .eq("kitchen_id", id.as_str())
                .eq("status", SubscriptionStatus::Active.as_str()),
        )
        .await?;

    Ok(Json(KitchenAnalytics {
        active_subscriptions: active.len(),
        ..KitchenAnalytics::tally(&deliveries)
    }))
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RevenueReport {
    pub total: f64,
    /// Keyed by `YYYY-MM` of the subscription's creation.
    pub by_month: BTreeMap<String, f64>,
    pub by_kitchen: BTreeMap<String, f64>,
}

impl RevenueReport {
    fn from_subscriptions(subs: &[Subscription]) -> Self {
        let mut report = Self {
            total: 0.0,
            by_month: BTreeMap::new(),
            by_kitchen: BTreeMap::new(),
        };
        for sub in subs {
            let Some(amount) = sub.amount else { continue };
            report.total += amount;
            *report
                .by_month
                .entry(sub.created_at.format("%Y-%m").to_string())
                .or_default() += amount;
            *report.by_kitchen.entry(sub.kitchen_id.clone()).or_default() += amount;
        }
        report
    }
}

async fn revenue_report(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<RevenueReport>> {
    authorize(&session, Action::ViewRevenue)?;
    let subs: Vec<Subscription> = state
        .store
        .query_docs(collections::SUBSCRIPTIONS, &Query::new())
        .await?;
    Ok(Json(RevenueReport::from_subscriptions(&subs)))
}

#[derive(Deserialize)]
struct AuditQuery {
    limit: Option<u32>,
}

async fn audit_logs(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    QueryParams(params): QueryParams<AuditQuery>,
) -> Result<Json<Vec<AuditLog>>> {
    authorize(&session, Action::ViewAuditLogs)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let query = Query::new().order_desc("at").limit(limit);
    Ok(Json(
        state
            .store
            .query_docs(collections::AUDIT_LOGS, &query)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn delivery_with(status: DeliveryStatus) -> Delivery {
        let now = Utc::now();
        Delivery {
            delivery_id: "d".to_string(),
            subscription_id: "s".to_string(),
            kitchen_id: "k".to_string(),
            customer_id: "c".to_string(),
            delivery_boy_id: None,
            delivery_date: now.date_naive(),
            meal_period: crate::models::MealPeriod::Lunch,
            day_number: 1,
            address: String::new(),
            location: None,
            menu_items: vec![],
            allergy_notes: None,
            status,
            current_location: None,
            dispatched_at: None,
            delivered_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_kitchen_buckets() {
        use DeliveryStatus::*;
        let deliveries: Vec<Delivery> = [
            Scheduled, Preparing, Ready, Dispatched, InTransit, Delivered, Cancelled,
        ]
        .into_iter()
        .map(delivery_with)
        .collect();

        let stats = KitchenAnalytics::tally(&deliveries);
        assert_eq!(
            stats,
            KitchenAnalytics {
                total: 7,
                pending: 2,
                ready: 1,
                dispatched: 2,
                delivered: 1,
                cancelled: 1,
                active_subscriptions: 0,
            }
        );
    }

    #[test]
    fn test_revenue_grouping_skips_unpriced() {
        let sub = |kitchen: &str, month: u32, amount: Option<f64>| {
            let at = Utc.with_ymd_and_hms(2026, month, 3, 10, 0, 0).unwrap();
            Subscription {
                subscription_id: format!("sub_{kitchen}_{month}"),
                customer_id: "c".to_string(),
                kitchen_id: kitchen.to_string(),
                plan_id: None,
                plan_type: crate::models::PlanType::Weekly,
                diet_type: crate::models::DietType::Veg,
                meal_periods: vec![crate::models::MealPeriod::Lunch],
                delivery_days: vec![],
                start_date: at.date_naive(),
                end_date: at.date_naive(),
                total_deliveries: 6,
                remaining_deliveries: 6,
                extended_deliveries: 0,
                delivered_count: 0,
                paused_dates: vec![],
                moved_dates: vec![],
                status: SubscriptionStatus::Active,
                amount,
                address: String::new(),
                location: None,
                allergy_notes: None,
                version: 1,
                created_at: at,
                updated_at: at,
            }
        };
        let report = RevenueReport::from_subscriptions(&[
            sub("k1", 1, Some(1000.0)),
            sub("k2", 1, Some(500.0)),
            sub("k1", 2, Some(250.0)),
            sub("k1", 2, None),
        ]);

        assert_eq!(report.total, 1750.0);
        assert_eq!(report.by_month.get("2026-01"), Some(&1500.0));
        assert_eq!(report.by_month.get("2026-02"), Some(&250.0));
        assert_eq!(report.by_kitchen.get("k1"), Some(&1250.0));
    }
}
