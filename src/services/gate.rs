// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Role-based access gate.
//!
//! Two policies live here and nowhere else:
//! - dashboard routing: which roles may open which client route, and where
//!   everyone else is sent instead;
//! - API authorization: which [`Action`]s a role may perform.
//!
//! Handlers receive a resolved [`Session`] and ask the gate; they never
//! compare role strings themselves.

use crate::error::AppError;
use crate::models::Role;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const LOGIN_ROUTE: &str = "/login";
pub const CHANGE_PASSWORD_ROUTE: &str = "/change-password";

/// Identity of the caller, resolved once per request by the auth middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub kitchen_id: Option<String>,
    pub city: Option<String>,
    pub must_change_password: bool,
}

impl Session {
    pub fn permits(&self, action: Action) -> bool {
        self.role.permits(action)
    }

    /// Whether this session is bound to `kitchen_id` (admins are bound to all).
    pub fn owns_kitchen(&self, kitchen_id: &str) -> bool {
        self.role.is_admin() || self.kitchen_id.as_deref() == Some(kitchen_id)
    }
}

/// Client dashboards guarded by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedRoute {
    Dashboard,
    Profile,
    Subscription,
    Tracking,
    Kitchen,
    Delivery,
    Sales,
    CityManager,
    Admin,
    SuperAdmin,
    ChangePassword,
}

impl GatedRoute {
    /// Match a client path (first segment) to a gated route.
    pub fn parse(path: &str) -> Option<Self> {
        let first = path
            .trim_start_matches('/')
            .split(['/', '?', '#'])
            .next()
            .unwrap_or("");
        let route = match first {
            "dashboard" => GatedRoute::Dashboard,
            "profile" => GatedRoute::Profile,
            "subscription" => GatedRoute::Subscription,
            "tracking" => GatedRoute::Tracking,
            "kitchen" => GatedRoute::Kitchen,
            "delivery" => GatedRoute::Delivery,
            "sales" => GatedRoute::Sales,
            "city-manager" => GatedRoute::CityManager,
            "admin" => GatedRoute::Admin,
            "super-admin" => GatedRoute::SuperAdmin,
            "change-password" => GatedRoute::ChangePassword,
            _ => return None,
        };
        Some(route)
    }

    pub fn allows(self, role: Role) -> bool {
        use Role::*;
        match self {
            GatedRoute::Dashboard
            | GatedRoute::Profile
            | GatedRoute::Subscription
            | GatedRoute::Tracking => role == Customer,
            GatedRoute::Kitchen => matches!(role, KitchenManager | SuperAdmin | Admin),
            GatedRoute::Delivery => matches!(role, DeliveryBoy | SuperAdmin | Admin),
            GatedRoute::Sales => {
                matches!(role, SalesManager | SalesExecutive | SuperAdmin | Admin)
            }
            GatedRoute::CityManager => matches!(role, CityManager | SuperAdmin | Admin),
            GatedRoute::Admin => matches!(role, Admin | SuperAdmin),
            GatedRoute::SuperAdmin => role == SuperAdmin,
            GatedRoute::ChangePassword => true,
        }
    }
}

/// Outcome of routing a client path through the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum GateDecision {
    Allow,
    /// Silent redirect to the caller's own landing route.
    Redirect { to: String },
    Login { to: String, from: String },
    ChangePassword { to: String },
}

/// Decide what the client should do when `session` navigates to `path`.
pub fn evaluate(session: Option<&Session>, path: &str) -> GateDecision {
    let route = GatedRoute::parse(path);

    let Some(session) = session else {
        return match route {
            Some(_) => GateDecision::Login {
                to: LOGIN_ROUTE.to_string(),
                from: path.to_string(),
            },
            None => GateDecision::Allow,
        };
    };

    if session.must_change_password {
        return match route {
            Some(GatedRoute::ChangePassword) => GateDecision::Allow,
            _ => GateDecision::ChangePassword {
                to: CHANGE_PASSWORD_ROUTE.to_string(),
            },
        };
    }

    match route {
        Some(route) if !route.allows(session.role) => {
            tracing::debug!(
                role = %session.role,
                path,
                "Redirecting to landing route"
            );
            GateDecision::Redirect {
                to: session.role.landing_route().to_string(),
            }
        }
        _ => GateDecision::Allow,
    }
}

/// API operations subject to role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageKitchens,
    ViewUsers,
    CreateCustomers,
    CreateStaff,
    ManageUsers,
    ManagePlans,
    ManageMenu,
    ViewMenuTemplates,
    ManageBanners,
    CreateSubscription,
    ViewAllSubscriptions,
    ManageAnySubscription,
    CancelSubscription,
    DriveKitchenStages,
    DriveDeliveryStages,
    AssignDelivery,
    CancelAnyDelivery,
    ViewKitchenDeliveries,
    UpdateLocation,
    ReviewDeliveryRequests,
    ViewAdminAnalytics,
    ViewKitchenAnalytics,
    ViewRevenue,
    ViewAuditLogs,
}

impl Role {
    /// The permission matrix.
    pub fn permits(self, action: Action) -> bool {
        use Action::*;
        match self {
            Role::SuperAdmin | Role::Admin => true,
            Role::SalesManager => matches!(
                action,
                CreateCustomers
                    | CreateStaff
                    | ViewUsers
                    | CreateSubscription
                    | ViewAllSubscriptions
                    | ManageAnySubscription
                    | ViewRevenue
            ),
            Role::SalesExecutive => matches!(
                action,
                CreateSubscription | ViewAllSubscriptions | ManageAnySubscription
            ),
            Role::CityManager => matches!(
                action,
                ViewUsers
                    | ViewAllSubscriptions
                    | ManageAnySubscription
                    | CancelAnyDelivery
                    | ViewKitchenDeliveries
                    | ReviewDeliveryRequests
                    | ViewKitchenAnalytics
            ),
            Role::KitchenManager => matches!(
                action,
                ManageMenu
                    | ViewMenuTemplates
                    | DriveKitchenStages
                    | AssignDelivery
                    | CancelAnyDelivery
                    | ViewKitchenDeliveries
                    | ViewKitchenAnalytics
            ),
            Role::DeliveryBoy => matches!(
                action,
                DriveDeliveryStages | ViewKitchenDeliveries | UpdateLocation
            ),
            Role::Customer => matches!(action, CreateSubscription),
        }
    }

    /// Roles a creator of this role may provision.
    pub fn may_create(self, target: Role) -> bool {
        match self {
            Role::SuperAdmin => true,
            Role::Admin => target != Role::SuperAdmin,
            Role::SalesManager => matches!(target, Role::Customer | Role::SalesExecutive),
            _ => false,
        }
    }
}

/// Reject the request unless the session may perform `action`.
pub fn authorize(session: &Session, action: Action) -> Result<(), AppError> {
    if session.permits(action) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %session.user_id,
            role = %session.role,
            ?action,
            "Action not permitted"
        );
        Err(AppError::Forbidden("Insufficient permissions".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: "user_1".to_string(),
            role,
            kitchen_id: None,
            city: None,
            must_change_password: false,
        }
    }

    #[test]
    fn test_delivery_boy_redirected_from_admin() {
        let decision = evaluate(Some(&session(Role::DeliveryBoy)), "/admin");
        assert_eq!(
            decision,
            GateDecision::Redirect {
                to: "/delivery".to_string()
            }
        );
    }

    #[test]
    fn test_unauthenticated_keeps_origin() {
        let decision = evaluate(None, "/tracking/del_1");
        assert_eq!(
            decision,
            GateDecision::Login {
                to: "/login".to_string(),
                from: "/tracking/del_1".to_string()
            }
        );
        assert_eq!(evaluate(None, "/login"), GateDecision::Allow);
    }

    #[test]
    fn test_must_change_password_forces_route() {
        let mut s = session(Role::KitchenManager);
        s.must_change_password = true;
        assert_eq!(
            evaluate(Some(&s), "/kitchen"),
            GateDecision::ChangePassword {
                to: "/change-password".to_string()
            }
        );
        assert_eq!(evaluate(Some(&s), "/change-password"), GateDecision::Allow);
    }

    #[test]
    fn test_every_role_may_open_its_landing_route() {
        for role in Role::ALL {
            assert_eq!(
                evaluate(Some(&session(role)), role.landing_route()),
                GateDecision::Allow,
                "{role} should reach its own dashboard"
            );
        }
    }

    #[test]
    fn test_admin_reaches_staff_dashboards_but_not_super_admin() {
        let admin = session(Role::Admin);
        for path in ["/kitchen", "/delivery", "/sales", "/city-manager", "/admin"] {
            assert_eq!(evaluate(Some(&admin), path), GateDecision::Allow);
        }
        assert_eq!(
            evaluate(Some(&admin), "/super-admin"),
            GateDecision::Redirect {
                to: "/admin".to_string()
            }
        );
        assert_eq!(
            evaluate(Some(&admin), "/dashboard"),
            GateDecision::Redirect {
                to: "/admin".to_string()
            }
        );
    }

    #[test]
    fn test_decision_wire_format() {
        let json = serde_json::to_value(GateDecision::Redirect {
            to: "/sales".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"action": "redirect", "to": "/sales"}));
    }

    #[test]
    fn test_permission_matrix() {
        assert!(Role::KitchenManager.permits(Action::DriveKitchenStages));
        assert!(!Role::KitchenManager.permits(Action::DriveDeliveryStages));
        assert!(Role::DeliveryBoy.permits(Action::DriveDeliveryStages));
        assert!(!Role::Customer.permits(Action::CancelAnyDelivery));
        assert!(Role::Admin.permits(Action::ViewAuditLogs));
        assert!(!Role::SalesExecutive.permits(Action::ViewAuditLogs));
    }

    #[test]
    fn test_sales_manager_provisioning() {
        assert!(Role::SalesManager.may_create(Role::Customer));
        assert!(Role::SalesManager.may_create(Role::SalesExecutive));
        assert!(!Role::SalesManager.may_create(Role::KitchenManager));
        assert!(!Role::Admin.may_create(Role::SuperAdmin));
    }

    #[test]
    fn test_authorize_rejects_with_forbidden() {
        let err = authorize(&session(Role::Customer), Action::ViewAuditLogs).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
