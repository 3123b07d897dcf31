// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account roles.

use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// The closed set of roles a session can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Role {
    SuperAdmin,
    Admin,
    SalesManager,
    SalesExecutive,
    CityManager,
    #[serde(alias = "kitchen_staff")]
    KitchenManager,
    DeliveryBoy,
    Customer,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::SalesManager,
        Role::SalesExecutive,
        Role::CityManager,
        Role::KitchenManager,
        Role::DeliveryBoy,
        Role::Customer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::SalesManager => "sales_manager",
            Role::SalesExecutive => "sales_executive",
            Role::CityManager => "city_manager",
            Role::KitchenManager => "kitchen_manager",
            Role::DeliveryBoy => "delivery_boy",
            Role::Customer => "customer",
        }
    }

    /// Default dashboard a user of this role lands on.
    pub fn landing_route(self) -> &'static str {
        match self {
            Role::SuperAdmin => "/super-admin",
            Role::Admin => "/admin",
            Role::SalesManager | Role::SalesExecutive => "/sales",
            Role::CityManager => "/city-manager",
            Role::KitchenManager => "/kitchen",
            Role::DeliveryBoy => "/delivery",
            Role::Customer => "/dashboard",
        }
    }

    /// Admin tiers bypass kitchen and city scoping.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    /// Roles bound to a single kitchen.
    pub fn requires_kitchen(self) -> bool {
        matches!(self, Role::KitchenManager | Role::DeliveryBoy)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitchen_staff_alias() {
        let role: Role = serde_json::from_str("\"kitchen_staff\"").unwrap();
        assert_eq!(role, Role::KitchenManager);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"kitchen_manager\"");
    }

    #[test]
    fn test_every_role_has_a_landing_route() {
        for role in Role::ALL {
            assert!(role.landing_route().starts_with('/'));
        }
        assert_eq!(Role::SalesExecutive.landing_route(), "/sales");
    }
}
