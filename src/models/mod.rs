// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod audit;
pub mod catalog;
pub mod delivery;
pub mod delivery_request;
pub mod image;
pub mod kitchen;
pub mod notification;
pub mod role;
pub mod subscription;
pub mod user;

pub use audit::AuditLog;
pub use catalog::{Banner, MenuItem, MenuTemplate, Plan, TemplateSlot};
pub use delivery::{Delivery, DeliveryStatus, MenuItemSnapshot};
pub use delivery_request::{DeliveryRequest, RequestStatus, RequestType};
pub use image::StoredImage;
pub use kitchen::{GeoPoint, Kitchen};
pub use notification::Notification;
pub use role::Role;
pub use subscription::{
    DeliveryDay, DietType, MealPeriod, PlanType, Subscription, SubscriptionStatus,
};
pub use user::{HealthProfile, User, UserResponse};
