// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plans, menu items, weekly menu templates and promotional banners.

use crate::models::{DeliveryDay, DietType, MealPeriod, MenuItemSnapshot, PlanType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A sellable plan in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Plan {
    pub plan_id: String,
    pub name: String,
    pub plan_type: PlanType,
    pub diet_type: DietType,
    pub meal_periods: Vec<MealPeriod>,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A dish a kitchen can serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MenuItem {
    pub item_id: String,
    pub kitchen_id: String,
    pub name: String,
    pub category: String,
    pub meal_period: MealPeriod,
    pub diet_type: DietType,
    pub calories: u32,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl MenuItem {
    pub fn snapshot(&self) -> MenuItemSnapshot {
        MenuItemSnapshot {
            item_id: self.item_id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            diet_type: self.diet_type,
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TemplateSlot {
    pub weekday: DeliveryDay,
    pub meal_period: MealPeriod,
    pub item_id: String,
}

/// Named weekly rotation of menu items for one kitchen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MenuTemplate {
    pub template_id: String,
    pub kitchen_id: String,
    pub name: String,
    pub diet_type: DietType,
    pub slots: Vec<TemplateSlot>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Banner {
    pub banner_id: String,
    pub title: String,
    pub image_url: String,
    #[serde(default)]
    pub link: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
