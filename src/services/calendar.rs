// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Delivery calendar generation.
//!
//! Generation is a pure function of the subscription and the deliveries it
//! already has, so it can be re-run at any time: it only fills slots that
//! are free, and a slot's delivery id is derived from
//! `(subscription_id, date, meal_period)`.

use crate::models::{
    Delivery, DeliveryStatus, MealPeriod, MenuItem, MenuItemSnapshot, Subscription,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;

/// One planned delivery slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub date: NaiveDate,
    pub meal_period: MealPeriod,
    pub day_number: u32,
}

/// Deterministic document id for a subscription slot.
pub fn delivery_id_for(subscription_id: &str, date: NaiveDate, period: MealPeriod) -> String {
    format!(
        "del_{}_{}_{}",
        subscription_id,
        date.format("%Y%m%d"),
        period.as_str()
    )
}

/// Meal periods in serving order, without duplicates.
pub fn normalized_periods(periods: &[MealPeriod]) -> Vec<MealPeriod> {
    let mut periods = periods.to_vec();
    periods.sort();
    periods.dedup();
    periods
}

/// Slots to add so that live deliveries plus paused reservations reach
/// `total_deliveries`.
///
/// Walks `start_date..=end_date`, skipping Sundays and non-delivery days,
/// paused dates and dates whose meals were moved away, dates before
/// `earliest`, and slots that already hold a delivery in any status.
pub fn plan_top_up(sub: &Subscription, existing: &[Delivery], earliest: NaiveDate) -> Vec<Slot> {
    let periods = normalized_periods(&sub.meal_periods);
    let live = existing
        .iter()
        .filter(|d| d.status != DeliveryStatus::Cancelled)
        .count();
    let reserved = sub.paused_dates.len() * periods.len();
    let mut needed = (sub.total_deliveries as usize).saturating_sub(live + reserved);

    let occupied: HashSet<(NaiveDate, MealPeriod)> = existing
        .iter()
        .map(|d| (d.delivery_date, d.meal_period))
        .collect();

    let mut slots = Vec::with_capacity(needed);
    let mut day_number = 0u32;
    for date in sub.start_date.iter_days() {
        if date > sub.end_date || needed == 0 {
            break;
        }
        if !sub.delivers_on(date) {
            continue;
        }
        day_number += 1;
        if date < earliest || sub.is_paused_on(date) || sub.is_moved_from(date) {
            continue;
        }
        for &meal_period in &periods {
            if needed == 0 {
                break;
            }
            if occupied.contains(&(date, meal_period)) {
                continue;
            }
            slots.push(Slot {
                date,
                meal_period,
                day_number,
            });
            needed -= 1;
        }
    }
    slots
}

/// 1-based position of `date` among the subscription's delivery days.
pub fn day_number_of(sub: &Subscription, date: NaiveDate) -> u32 {
    sub.start_date
        .iter_days()
        .take_while(|d| *d <= date)
        .filter(|d| sub.delivers_on(*d))
        .count() as u32
}

/// Active menu items of the subscription's kitchen that fit a slot.
pub fn menu_for(sub: &Subscription, period: MealPeriod, menu: &[MenuItem]) -> Vec<MenuItemSnapshot> {
    menu.iter()
        .filter(|item| {
            item.is_active
                && item.kitchen_id == sub.kitchen_id
                && item.meal_period == period
                && sub.diet_type.accepts(item.diet_type)
        })
        .map(MenuItem::snapshot)
        .collect()
}

/// Materialize a planned slot as a scheduled delivery.
pub fn slot_delivery(
    sub: &Subscription,
    slot: Slot,
    menu: &[MenuItem],
    now: DateTime<Utc>,
) -> Delivery {
    Delivery {
        delivery_id: delivery_id_for(&sub.subscription_id, slot.date, slot.meal_period),
        subscription_id: sub.subscription_id.clone(),
        kitchen_id: sub.kitchen_id.clone(),
        customer_id: sub.customer_id.clone(),
        delivery_boy_id: None,
        delivery_date: slot.date,
        meal_period: slot.meal_period,
        day_number: slot.day_number,
        address: sub.address.clone(),
        location: sub.location,
        menu_items: menu_for(sub, slot.meal_period, menu),
        allergy_notes: sub.allergy_notes.clone(),
        status: DeliveryStatus::Scheduled,
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

/// Plan and materialize the deliveries a top-up would add.
pub fn top_up(
    sub: &Subscription,
    existing: &[Delivery],
    earliest: NaiveDate,
    menu: &[MenuItem],
    now: DateTime<Utc>,
) -> Vec<Delivery> {
    plan_top_up(sub, existing, earliest)
        .into_iter()
        .map(|slot| slot_delivery(sub, slot, menu, now))
        .collect()
}
