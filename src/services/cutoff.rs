// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Customer self-cancellation cutoffs.
//!
//! Each meal period has a fixed local time of day after which the kitchen
//! has committed to production and the customer can no longer cancel that
//! day's meal. Staff cancellations are not subject to cutoffs.

use crate::models::{DeliveryStatus, MealPeriod};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Cutoff time of day for a meal period.
pub fn cutoff_time(period: MealPeriod) -> NaiveTime {
    let (h, m) = match period {
        MealPeriod::Breakfast => (7, 0),
        MealPeriod::Lunch => (9, 30),
        MealPeriod::Dinner => (15, 0),
    };
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// Human-readable cutoff, as shown in the customer dashboard.
pub fn cutoff_display(period: MealPeriod) -> &'static str {
    match period {
        MealPeriod::Breakfast => "7:00 AM",
        MealPeriod::Lunch => "9:30 AM",
        MealPeriod::Dinner => "3:00 PM",
    }
}

/// Whether the owning customer may still cancel a delivery at local time `now`.
///
/// Future-dated deliveries are cancellable until dispatch; today's delivery
/// only strictly before the meal period's cutoff; past dates never.
pub fn customer_may_cancel(
    status: DeliveryStatus,
    delivery_date: NaiveDate,
    period: MealPeriod,
    now: NaiveDateTime,
) -> bool {
    if !status.is_pre_dispatch() {
        return false;
    }
    let today = now.date();
    if delivery_date > today {
        true
    } else if delivery_date == today {
        now.time() < cutoff_time(period)
    } else {
        false
    }
}
