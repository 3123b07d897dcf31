// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription ledger records and the plan vocabulary they use.

use crate::models::GeoPoint;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A meal slot within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum MealPeriod {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealPeriod {
    pub const ALL: [MealPeriod; 3] = [MealPeriod::Breakfast, MealPeriod::Lunch, MealPeriod::Dinner];

    pub fn as_str(self) -> &'static str {
        match self {
            MealPeriod::Breakfast => "breakfast",
            MealPeriod::Lunch => "lunch",
            MealPeriod::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog plan lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum PlanType {
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "15_day", alias = "fifteen_day", alias = "15day")]
    FifteenDay,
    #[serde(rename = "monthly")]
    Monthly,
}

impl PlanType {
    /// Number of delivery days the plan grants.
    pub fn delivery_day_count(self) -> u32 {
        match self {
            PlanType::Weekly => 6,
            PlanType::FifteenDay => 12,
            PlanType::Monthly => 24,
        }
    }

    /// Length of the validity window in calendar days.
    pub fn validity_days(self) -> u32 {
        match self {
            PlanType::Weekly => 7,
            PlanType::FifteenDay => 15,
            PlanType::Monthly => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Weekly => "weekly",
            PlanType::FifteenDay => "15_day",
            PlanType::Monthly => "monthly",
        }
    }
}

/// Diet a subscription (or menu item) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum DietType {
    #[serde(alias = "pure_veg")]
    Veg,
    NonVeg,
    Mixed,
    BreakfastOnly,
}

impl DietType {
    /// Whether a menu item of diet `item` may be served on this diet.
    pub fn accepts(self, item: DietType) -> bool {
        match self {
            DietType::Veg => item == DietType::Veg,
            DietType::NonVeg | DietType::Mixed | DietType::BreakfastOnly => true,
        }
    }
}

/// Weekday a subscription delivers on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum DeliveryDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DeliveryDay {
    /// Monday through Saturday.
    pub const WORKING_WEEK: [DeliveryDay; 6] = [
        DeliveryDay::Monday,
        DeliveryDay::Tuesday,
        DeliveryDay::Wednesday,
        DeliveryDay::Thursday,
        DeliveryDay::Friday,
        DeliveryDay::Saturday,
    ];

    pub fn weekday(self) -> Weekday {
        match self {
            DeliveryDay::Monday => Weekday::Mon,
            DeliveryDay::Tuesday => Weekday::Tue,
            DeliveryDay::Wednesday => Weekday::Wed,
            DeliveryDay::Thursday => Weekday::Thu,
            DeliveryDay::Friday => Weekday::Fri,
            DeliveryDay::Saturday => Weekday::Sat,
            DeliveryDay::Sunday => Weekday::Sun,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Completed => "completed",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_closed(self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Completed | SubscriptionStatus::Cancelled
        )
    }
}

/// A customer's meal plan and its delivery-credit ledger.
///
/// Stored at: `subscriptions/{subscription_id}`
///
/// Credits balance at all times:
/// `remaining_deliveries + delivered_count == total_deliveries + extended_deliveries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Subscription {
    pub subscription_id: String,
    #[serde(alias = "user_id")]
    pub customer_id: String,
    pub kitchen_id: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    pub plan_type: PlanType,
    pub diet_type: DietType,
    #[serde(alias = "meals")]
    pub meal_periods: Vec<MealPeriod>,
    pub delivery_days: Vec<DeliveryDay>,
    pub start_date: NaiveDate,
    /// Last day (inclusive) of the delivery window.
    pub end_date: NaiveDate,
    pub total_deliveries: u32,
    pub remaining_deliveries: u32,
    #[serde(default)]
    pub extended_deliveries: u32,
    #[serde(default)]
    pub delivered_count: u32,
    #[serde(default)]
    pub paused_dates: Vec<NaiveDate>,
    /// Dates whose meals were moved elsewhere; never refilled.
    #[serde(default)]
    pub moved_dates: Vec<NaiveDate>,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub amount: Option<f64>,
    /// Delivery address captured from the customer at creation.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub allergy_notes: Option<String>,
    /// Optimistic concurrency counter, bumped on every committed change.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether `date` falls on a configured delivery day (never Sunday).
    pub fn delivers_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        let weekday = date.weekday();
        weekday != Weekday::Sun && self.delivery_days.iter().any(|d| d.weekday() == weekday)
    }

    pub fn is_paused_on(&self, date: NaiveDate) -> bool {
        self.paused_dates.contains(&date)
    }

    pub fn is_moved_from(&self, date: NaiveDate) -> bool {
        self.moved_dates.contains(&date)
    }

    /// The credit-conservation identity.
    pub fn credits_balanced(&self) -> bool {
        u64::from(self.remaining_deliveries) + u64::from(self.delivered_count)
            == u64::from(self.total_deliveries) + u64::from(self.extended_deliveries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_type_wire_names() {
        let plan: PlanType = serde_json::from_str("\"15_day\"").unwrap();
        assert_eq!(plan, PlanType::FifteenDay);
        let plan: PlanType = serde_json::from_str("\"fifteen_day\"").unwrap();
        assert_eq!(plan, PlanType::FifteenDay);
        assert_eq!(serde_json::to_string(&PlanType::Monthly).unwrap(), "\"monthly\"");
    }

    #[test]
    fn test_catalog_mapping() {
        assert_eq!(
            (PlanType::Weekly.delivery_day_count(), PlanType::Weekly.validity_days()),
            (6, 7)
        );
        assert_eq!(
            (
                PlanType::FifteenDay.delivery_day_count(),
                PlanType::FifteenDay.validity_days()
            ),
            (12, 15)
        );
        assert_eq!(
            (PlanType::Monthly.delivery_day_count(), PlanType::Monthly.validity_days()),
            (24, 30)
        );
    }

    #[test]
    fn test_diet_acceptance() {
        assert!(DietType::Veg.accepts(DietType::Veg));
        assert!(!DietType::Veg.accepts(DietType::NonVeg));
        assert!(DietType::Mixed.accepts(DietType::NonVeg));
        assert!(DietType::BreakfastOnly.accepts(DietType::Veg));
    }

    #[test]
    fn test_pure_veg_alias() {
        let diet: DietType = serde_json::from_str("\"pure_veg\"").unwrap();
        assert_eq!(diet, DietType::Veg);
    }
}
