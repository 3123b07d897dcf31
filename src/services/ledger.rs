// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription ledger: plan validation, credit counters, pause/resume.
//!
//! Every mutation keeps
//! `remaining_deliveries + delivered_count == total_deliveries + extended_deliveries`.

use crate::models::{
    Delivery, DeliveryDay, DeliveryStatus, DietType, GeoPoint, MealPeriod, PlanType,
    Subscription, SubscriptionStatus,
};
use crate::services::calendar::normalized_periods;
use crate::services::lifecycle::LifecycleError;
use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use serde::Deserialize;
use std::collections::BTreeSet;

/// Plan attributes as submitted by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSelection {
    pub plan_type: PlanType,
    pub diet_type: DietType,
    #[serde(alias = "meals")]
    pub meal_periods: Vec<MealPeriod>,
    #[serde(default)]
    pub delivery_days: Option<Vec<DeliveryDay>>,
    /// Optional explicit counts; when present they must match the catalog.
    #[serde(default)]
    pub delivery_day_count: Option<u32>,
    #[serde(default)]
    pub validity_days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub kitchen_id: String,
    pub plan_id: Option<String>,
    pub plan: PlanSelection,
    pub start_date: NaiveDate,
    pub amount: Option<f64>,
    pub address: String,
    pub location: Option<GeoPoint>,
    pub allergy_notes: Option<String>,
}

/// Check a plan selection against the fixed catalog.
pub fn validate_plan(plan: &PlanSelection) -> Result<(), LifecycleError> {
    let plan_type = plan.plan_type;
    if let Some(count) = plan.delivery_day_count {
        if count != plan_type.delivery_day_count() {
            return Err(LifecycleError::InvalidPlan(format!(
                "{} plans have {} delivery days, not {}",
                plan_type.as_str(),
                plan_type.delivery_day_count(),
                count
            )));
        }
    }
    if let Some(days) = plan.validity_days {
        if days != plan_type.validity_days() {
            return Err(LifecycleError::InvalidPlan(format!(
                "{} plans are valid for {} days, not {}",
                plan_type.as_str(),
                plan_type.validity_days(),
                days
            )));
        }
    }
    if plan.meal_periods.is_empty() {
        return Err(LifecycleError::InvalidPlan(
            "At least one meal period is required".to_string(),
        ));
    }
    if plan.diet_type == DietType::BreakfastOnly
        && plan.meal_periods.iter().any(|p| *p != MealPeriod::Breakfast)
    {
        return Err(LifecycleError::InvalidPlan(
            "Breakfast-only plans can only include breakfast".to_string(),
        ));
    }
    if let Some(days) = &plan.delivery_days {
        if !days.iter().any(|d| d.weekday() != Weekday::Sun) {
            return Err(LifecycleError::InvalidPlan(
                "At least one delivery day other than Sunday is required".to_string(),
            ));
        }
    }
    Ok(())
}

/// Build a new subscription record; the caller generates its calendar.
pub fn open(
    new: NewSubscription,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Subscription, LifecycleError> {
    validate_plan(&new.plan)?;
    if new.start_date < today {
        return Err(LifecycleError::InvalidDate {
            date: new.start_date,
            reason: "start date is in the past".to_string(),
        });
    }

    let plan = new.plan;
    let meal_periods = normalized_periods(&plan.meal_periods);
    let mut delivery_days: Vec<DeliveryDay> = plan
        .delivery_days
        .unwrap_or_else(|| DeliveryDay::WORKING_WEEK.to_vec())
        .into_iter()
        .filter(|d| *d != DeliveryDay::Sunday)
        .collect();
    delivery_days.sort();
    delivery_days.dedup();

    let total = plan.plan_type.delivery_day_count() * meal_periods.len() as u32;
    let end_date =
        new.start_date + Duration::days(i64::from(plan.plan_type.validity_days()) - 1);

    Ok(Subscription {
        subscription_id: new.subscription_id,
        customer_id: new.customer_id,
        kitchen_id: new.kitchen_id,
        plan_id: new.plan_id,
        plan_type: plan.plan_type,
        diet_type: plan.diet_type,
        meal_periods,
        delivery_days,
        start_date: new.start_date,
        end_date,
        total_deliveries: total,
        remaining_deliveries: total,
        extended_deliveries: 0,
        delivered_count: 0,
        paused_dates: vec![],
        moved_dates: vec![],
        status: SubscriptionStatus::Active,
        amount: new.amount,
        address: new.address,
        location: new.location,
        allergy_notes: new.allergy_notes,
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Consume one credit for a delivered meal.
pub fn record_delivered(sub: &mut Subscription, now: DateTime<Utc>) {
    sub.remaining_deliveries = sub.remaining_deliveries.saturating_sub(1);
    sub.delivered_count += 1;
    sub.updated_at = now;
    debug_assert!(sub.credits_balanced());
}

/// Credit back `days` deliveries and push the window out by as many days.
///
/// Only the lifecycle engine calls this, on cancellation.
pub fn extend(sub: &mut Subscription, days: u32, now: DateTime<Utc>) {
    sub.extended_deliveries += days;
    sub.remaining_deliveries += days;
    sub.end_date += Duration::days(i64::from(days));
    sub.updated_at = now;
    debug_assert!(sub.credits_balanced());
}

fn unique_sorted(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    dates.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Pause future dates. Returns the ids of the scheduled deliveries to remove.
///
/// Each date must be after `today` and currently hold at least one
/// non-terminal delivery, all of them still `scheduled`.
pub fn pause(
    sub: &mut Subscription,
    dates: &[NaiveDate],
    deliveries: &[Delivery],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<String>, LifecycleError> {
    ensure_open(sub)?;
    let dates = unique_sorted(dates);
    if dates.is_empty() {
        return Err(LifecycleError::InvalidInput("No dates given".to_string()));
    }

    let mut removed = Vec::new();
    for date in &dates {
        if *date <= today {
            return Err(LifecycleError::InvalidDate {
                date: *date,
                reason: "only future dates can be paused".to_string(),
            });
        }
        let pending: Vec<&Delivery> = deliveries
            .iter()
            .filter(|d| d.delivery_date == *date && !d.status.is_terminal())
            .collect();
        if pending.is_empty() {
            return Err(LifecycleError::InvalidDate {
                date: *date,
                reason: "no pending delivery on this date".to_string(),
            });
        }
        if pending.iter().any(|d| d.status != DeliveryStatus::Scheduled) {
            return Err(LifecycleError::InvalidDate {
                date: *date,
                reason: "a delivery on this date is already being prepared".to_string(),
            });
        }
        removed.extend(pending.iter().map(|d| d.delivery_id.clone()));
    }

    sub.paused_dates.extend(dates);
    sub.paused_dates = unique_sorted(&sub.paused_dates);
    sub.updated_at = now;
    Ok(removed)
}

/// Un-pause dates; the caller regenerates their deliveries.
pub fn resume(
    sub: &mut Subscription,
    dates: &[NaiveDate],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    ensure_open(sub)?;
    let dates = unique_sorted(dates);
    if dates.is_empty() {
        return Err(LifecycleError::InvalidInput("No dates given".to_string()));
    }
    for date in &dates {
        if !sub.is_paused_on(*date) {
            return Err(LifecycleError::InvalidDate {
                date: *date,
                reason: "date is not paused".to_string(),
            });
        }
        if *date <= today {
            return Err(LifecycleError::InvalidDate {
                date: *date,
                reason: "only future dates can be resumed".to_string(),
            });
        }
    }
    sub.paused_dates.retain(|d| !dates.contains(d));
    sub.updated_at = now;
    Ok(())
}

/// Recompute `status` from counters, paused dates and pending deliveries.
///
/// `deliveries` must already include whatever a top-up just added; with
/// nothing pending and nothing paused ahead, the plan has run its course.
pub fn refresh_status(sub: &mut Subscription, deliveries: &[Delivery], today: NaiveDate) {
    if sub.status == SubscriptionStatus::Cancelled {
        return;
    }
    let pending = deliveries.iter().any(|d| !d.status.is_terminal());
    let paused_ahead = sub.paused_dates.iter().any(|d| *d > today);
    sub.status = if sub.delivered_count >= sub.total_deliveries {
        SubscriptionStatus::Completed
    } else if pending {
        SubscriptionStatus::Active
    } else if paused_ahead {
        SubscriptionStatus::Paused
    } else {
        SubscriptionStatus::Completed
    };
}

/// Explicit admin cancellation. Returns the deliveries that were cancelled.
pub fn close(
    sub: &mut Subscription,
    deliveries: &mut [Delivery],
    actor_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<String>, LifecycleError> {
    ensure_open(sub)?;
    let mut cancelled = Vec::new();
    for delivery in deliveries.iter_mut().filter(|d| !d.status.is_terminal()) {
        delivery.status = DeliveryStatus::Cancelled;
        delivery.cancelled_at = Some(now);
        delivery.cancelled_by = Some(actor_id.to_string());
        delivery.cancellation_reason = Some("Subscription cancelled".to_string());
        delivery.updated_at = now;
        cancelled.push(delivery.delivery_id.clone());
    }
    sub.status = SubscriptionStatus::Cancelled;
    sub.updated_at = now;
    Ok(cancelled)
}

fn ensure_open(sub: &Subscription) -> Result<(), LifecycleError> {
    if sub.status.is_closed() {
        Err(LifecycleError::NotPermitted(format!(
            "Subscription is {}",
            sub.status.as_str()
        )))
    } else {
        Ok(())
    }
}
