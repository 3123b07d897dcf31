// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Delivery records and the delivery status vocabulary.

use crate::models::{DietType, GeoPoint, MealPeriod};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Delivery status. `delivered` and `cancelled` are terminal.
///
/// `out_for_delivery` is accepted on input as a synonym of `dispatched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum DeliveryStatus {
    Scheduled,
    Preparing,
    Ready,
    #[serde(alias = "out_for_delivery")]
    Dispatched,
    InTransit,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Scheduled => "scheduled",
            DeliveryStatus::Preparing => "preparing",
            DeliveryStatus::Ready => "ready",
            DeliveryStatus::Dispatched => "dispatched",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// The single forward step along the happy path, if any.
    pub fn next(self) -> Option<DeliveryStatus> {
        match self {
            DeliveryStatus::Scheduled => Some(DeliveryStatus::Preparing),
            DeliveryStatus::Preparing => Some(DeliveryStatus::Ready),
            DeliveryStatus::Ready => Some(DeliveryStatus::Dispatched),
            DeliveryStatus::Dispatched => Some(DeliveryStatus::InTransit),
            DeliveryStatus::InTransit => Some(DeliveryStatus::Delivered),
            DeliveryStatus::Delivered | DeliveryStatus::Cancelled => None,
        }
    }

    /// Still in the kitchen (before dispatch).
    pub fn is_pre_dispatch(self) -> bool {
        matches!(
            self,
            DeliveryStatus::Scheduled | DeliveryStatus::Preparing | DeliveryStatus::Ready
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Menu item as captured onto a delivery when it was scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MenuItemSnapshot {
    pub item_id: String,
    pub name: String,
    pub category: String,
    pub diet_type: DietType,
    pub calories: u32,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// One meal delivery for one subscription, date and meal period.
///
/// Stored at: `deliveries/{delivery_id}`; the id is derived from
/// `(subscription_id, delivery_date, meal_period)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Delivery {
    pub delivery_id: String,
    pub subscription_id: String,
    pub kitchen_id: String,
    #[serde(alias = "user_id")]
    pub customer_id: String,
    #[serde(default)]
    pub delivery_boy_id: Option<String>,
    pub delivery_date: NaiveDate,
    pub meal_period: MealPeriod,
    /// Ordinal of the delivery date within the subscription (1-based).
    pub day_number: u32,
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub menu_items: Vec<MenuItemSnapshot>,
    #[serde(default)]
    pub allergy_notes: Option<String>,
    pub status: DeliveryStatus,
    /// Last position reported by the delivery partner.
    #[serde(default)]
    pub current_location: Option<GeoPoint>,
    #[serde(default)]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
