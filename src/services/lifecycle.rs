// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Delivery status state machine.
//!
//! ```text
//! scheduled -> preparing -> ready -> dispatched -> in_transit -> delivered
//! any non-terminal -> cancelled
//! ```
//!
//! The functions here mutate a single [`Delivery`] in memory and report
//! what happened; the caller applies the matching ledger effect and commits
//! both together under the subscription lock.

use crate::models::{Delivery, DeliveryStatus, GeoPoint, MealPeriod, Role, User};
use crate::services::cutoff;
use crate::services::gate::{Action, Session};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Cannot change delivery status from {from} to {to}")]
    InvalidTransition {
        from: DeliveryStatus,
        to: DeliveryStatus,
    },

    #[error("A delivery partner must be assigned before the delivery is {0}")]
    UnassignedDelivery(DeliveryStatus),

    #[error("Cannot {operation} a delivery that is {status}")]
    InvalidState {
        status: DeliveryStatus,
        operation: &'static str,
    },

    #[error("Cancellation cutoff for {meal_period} on {date} has passed")]
    CutoffPassed {
        meal_period: MealPeriod,
        date: NaiveDate,
    },

    #[error("{0}")]
    NotPermitted(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid date {date}: {reason}")]
    InvalidDate { date: NaiveDate, reason: String },

    #[error("{0}")]
    InvalidInput(String),
}

impl LifecycleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LifecycleError::InvalidPlan(_)
            | LifecycleError::InvalidDate { .. }
            | LifecycleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LifecycleError::NotPermitted(_) => StatusCode::FORBIDDEN,
            LifecycleError::InvalidTransition { .. }
            | LifecycleError::UnassignedDelivery(_)
            | LifecycleError::InvalidState { .. }
            | LifecycleError::CutoffPassed { .. } => StatusCode::CONFLICT,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::UnassignedDelivery(_) => "unassigned_delivery",
            LifecycleError::InvalidState { .. } => "invalid_state",
            LifecycleError::CutoffPassed { .. } => "cutoff_passed",
            LifecycleError::NotPermitted(_) => "not_permitted",
            LifecycleError::InvalidPlan(_) => "invalid_plan",
            LifecycleError::InvalidDate { .. } => "invalid_date",
            LifecycleError::InvalidInput(_) => "bad_request",
        }
    }
}

/// A status change that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
}

/// Who cancelled, which decides whether cutoffs and extensions apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelKind {
    Customer,
    Staff,
}

fn not_permitted(session: &Session, what: &str) -> LifecycleError {
    tracing::warn!(
        user_id = %session.user_id,
        role = %session.role,
        "Lifecycle operation not permitted: {}",
        what
    );
    LifecycleError::NotPermitted(format!("Not permitted to {}", what))
}

/// Whether `session` may drive the edge leaving `from`.
fn may_drive(session: &Session, delivery: &Delivery, from: DeliveryStatus) -> bool {
    if session.role.is_admin() {
        return true;
    }
    if from.is_pre_dispatch() {
        session.permits(Action::DriveKitchenStages) && session.owns_kitchen(&delivery.kitchen_id)
    } else {
        session.permits(Action::DriveDeliveryStages)
            && delivery.delivery_boy_id.as_deref() == Some(session.user_id.as_str())
    }
}

/// Move a delivery one step forward along the happy path.
pub fn advance(
    delivery: &mut Delivery,
    target: DeliveryStatus,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<Transition, LifecycleError> {
    let from = delivery.status;
    if from.is_terminal() || target == DeliveryStatus::Cancelled || from.next() != Some(target)
    {
        tracing::debug!(
            delivery_id = %delivery.delivery_id,
            from = %from,
            to = %target,
            "Rejected status transition"
        );
        return Err(LifecycleError::InvalidTransition { from, to: target });
    }

    if !may_drive(session, delivery, from) {
        return Err(not_permitted(session, &format!("move a delivery to {}", target)));
    }

    if matches!(target, DeliveryStatus::Ready | DeliveryStatus::Dispatched)
        && delivery.delivery_boy_id.is_none()
    {
        return Err(LifecycleError::UnassignedDelivery(target));
    }

    delivery.status = target;
    delivery.updated_at = now;
    match target {
        DeliveryStatus::Dispatched => delivery.dispatched_at = Some(now),
        DeliveryStatus::Delivered => delivery.delivered_at = Some(now),
        _ => {}
    }

    Ok(Transition { from, to: target })
}

/// Attach a delivery partner while the meal is still in the kitchen.
pub fn assign(
    delivery: &mut Delivery,
    delivery_boy: &User,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if !delivery.status.is_pre_dispatch() {
        return Err(LifecycleError::InvalidState {
            status: delivery.status,
            operation: "assign",
        });
    }
    if !session.permits(Action::AssignDelivery) || !session.owns_kitchen(&delivery.kitchen_id) {
        return Err(not_permitted(session, "assign this delivery"));
    }
    if delivery_boy.role != Role::DeliveryBoy || !delivery_boy.is_active {
        return Err(LifecycleError::NotPermitted(
            "Assignee is not an active delivery partner".to_string(),
        ));
    }
    if delivery_boy.kitchen_id.as_deref() != Some(delivery.kitchen_id.as_str()) {
        return Err(LifecycleError::NotPermitted(
            "Delivery partner belongs to a different kitchen".to_string(),
        ));
    }

    delivery.delivery_boy_id = Some(delivery_boy.user_id.clone());
    delivery.updated_at = now;
    Ok(())
}

/// Cancel a non-terminal delivery.
///
/// Customers may cancel only their own deliveries and only before the
/// cutoff; staff with [`Action::CancelAnyDelivery`] may cancel any time
/// before delivery (kitchen managers only in their own kitchen).
pub fn cancel(
    delivery: &mut Delivery,
    session: &Session,
    reason: Option<String>,
    local_now: NaiveDateTime,
    now: DateTime<Utc>,
) -> Result<CancelKind, LifecycleError> {
    if delivery.status.is_terminal() {
        return Err(LifecycleError::InvalidTransition {
            from: delivery.status,
            to: DeliveryStatus::Cancelled,
        });
    }

    let kind = if session.role == Role::Customer {
        if delivery.customer_id != session.user_id {
            return Err(not_permitted(session, "cancel another customer's delivery"));
        }
        if !cutoff::customer_may_cancel(
            delivery.status,
            delivery.delivery_date,
            delivery.meal_period,
            local_now,
        ) {
            tracing::debug!(
                delivery_id = %delivery.delivery_id,
                status = %delivery.status,
                "Customer cancellation past cutoff"
            );
            return Err(LifecycleError::CutoffPassed {
                meal_period: delivery.meal_period,
                date: delivery.delivery_date,
            });
        }
        CancelKind::Customer
    } else if session.permits(Action::CancelAnyDelivery)
        && (session.role != Role::KitchenManager || session.owns_kitchen(&delivery.kitchen_id))
    {
        CancelKind::Staff
    } else {
        return Err(not_permitted(session, "cancel this delivery"));
    };

    delivery.status = DeliveryStatus::Cancelled;
    delivery.cancelled_at = Some(now);
    delivery.cancelled_by = Some(session.user_id.clone());
    delivery.cancellation_reason = reason;
    delivery.updated_at = now;
    Ok(kind)
}

/// Store the assigned partner's position on an outbound delivery.
pub fn record_location(
    delivery: &mut Delivery,
    point: GeoPoint,
    session: &Session,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if !session.permits(Action::UpdateLocation)
        || delivery.delivery_boy_id.as_deref() != Some(session.user_id.as_str())
    {
        return Err(not_permitted(session, "track this delivery"));
    }
    if !matches!(
        delivery.status,
        DeliveryStatus::Dispatched | DeliveryStatus::InTransit
    ) {
        return Err(LifecycleError::InvalidState {
            status: delivery.status,
            operation: "track",
        });
    }
    if !point.is_valid() {
        return Err(LifecycleError::InvalidInput(
            "Location is out of range".to_string(),
        ));
    }
    delivery.current_location = Some(point);
    delivery.updated_at = now;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::MealPeriod;
    use chrono::NaiveDate;

    pub(crate) fn sample_delivery(status: DeliveryStatus) -> Delivery {
        let now = Utc::now();
        Delivery {
            delivery_id: "del_sub_1_20260304_lunch".to_string(),
            subscription_id: "sub_1".to_string(),
            kitchen_id: "kit_1".to_string(),
            customer_id: "cust_1".to_string(),
            delivery_boy_id: None,
            delivery_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
            meal_period: MealPeriod::Lunch,
            day_number: 1,
            address: "12 MG Road".to_string(),
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

    pub(crate) fn session(role: Role, user_id: &str, kitchen: Option<&str>) -> Session {
        Session {
            user_id: user_id.to_string(),
            role,
            kitchen_id: kitchen.map(str::to_string),
            city: None,
            must_change_password: false,
        }
    }

    fn rider(kitchen: &str) -> User {
        User {
            user_id: "boy_1".to_string(),
            email: None,
            phone: Some("9000000009".to_string()),
            name: "Ravi".to_string(),
            picture: None,
            role: Role::DeliveryBoy,
            kitchen_id: Some(kitchen.to_string()),
            city: None,
            address: None,
            google_location: None,
            profile: None,
            password_hash: None,
            must_change_password: false,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_happy_path() {
        let kitchen = session(Role::KitchenManager, "km_1", Some("kit_1"));
        let boy = session(Role::DeliveryBoy, "boy_1", Some("kit_1"));
        let now = Utc::now();
        let mut d = sample_delivery(DeliveryStatus::Scheduled);

        advance(&mut d, DeliveryStatus::Preparing, &kitchen, now).unwrap();
        assign(&mut d, &rider("kit_1"), &kitchen, now).unwrap();
        advance(&mut d, DeliveryStatus::Ready, &kitchen, now).unwrap();
        advance(&mut d, DeliveryStatus::Dispatched, &kitchen, now).unwrap();
        assert_eq!(d.dispatched_at, Some(now));
        advance(&mut d, DeliveryStatus::InTransit, &boy, now).unwrap();
        let t = advance(&mut d, DeliveryStatus::Delivered, &boy, now).unwrap();
        assert_eq!(t.to, DeliveryStatus::Delivered);
        assert_eq!(d.delivered_at, Some(now));
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let admin = session(Role::Admin, "adm_1", None);
        let mut d = sample_delivery(DeliveryStatus::Scheduled);
        let err = advance(&mut d, DeliveryStatus::Ready, &admin, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: DeliveryStatus::Scheduled,
                to: DeliveryStatus::Ready
            }
        );
        assert_eq!(d.status, DeliveryStatus::Scheduled);
    }

    #[test]
    fn test_ready_requires_assignment() {
        let kitchen = session(Role::KitchenManager, "km_1", Some("kit_1"));
        let mut d = sample_delivery(DeliveryStatus::Preparing);
        let err = advance(&mut d, DeliveryStatus::Ready, &kitchen, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::UnassignedDelivery(DeliveryStatus::Ready));
    }

    #[test]
    fn test_role_edges() {
        let boy = session(Role::DeliveryBoy, "boy_1", Some("kit_1"));
        let other_kitchen = session(Role::KitchenManager, "km_2", Some("kit_2"));
        let mut d = sample_delivery(DeliveryStatus::Scheduled);

        let err = advance(&mut d, DeliveryStatus::Preparing, &boy, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::NotPermitted(_)));
        let err =
            advance(&mut d, DeliveryStatus::Preparing, &other_kitchen, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::NotPermitted(_)));

        let mut d = sample_delivery(DeliveryStatus::Dispatched);
        d.delivery_boy_id = Some("boy_2".to_string());
        let err = advance(&mut d, DeliveryStatus::InTransit, &boy, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::NotPermitted(_)));
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let admin = session(Role::SuperAdmin, "root", None);
        for status in [DeliveryStatus::Delivered, DeliveryStatus::Cancelled] {
            let mut d = sample_delivery(status);
            for target in [
                DeliveryStatus::Scheduled,
                DeliveryStatus::Preparing,
                DeliveryStatus::Delivered,
            ] {
                assert!(advance(&mut d, target, &admin, Utc::now()).is_err());
            }
            assert!(matches!(
                assign(&mut d, &rider("kit_1"), &admin, Utc::now()),
                Err(LifecycleError::InvalidState { .. })
            ));
            assert!(cancel(&mut d, &admin, None, Utc::now().naive_utc(), Utc::now()).is_err());
            assert_eq!(d.status, status);
        }
    }

    #[test]
    fn test_assign_after_dispatch_is_invalid_state() {
        let admin = session(Role::Admin, "adm_1", None);
        let mut d = sample_delivery(DeliveryStatus::Dispatched);
        let err = assign(&mut d, &rider("kit_1"), &admin, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidState {
                status: DeliveryStatus::Dispatched,
                operation: "assign"
            }
        );
    }

    #[test]
    fn test_customer_cancel_respects_cutoff_staff_does_not() {
        let customer = session(Role::Customer, "cust_1", None);
        let city = session(Role::CityManager, "cm_1", None);
        let date = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();

        let mut d = sample_delivery(DeliveryStatus::Scheduled);
        let before = date.and_hms_opt(9, 29, 0).unwrap();
        assert_eq!(
            cancel(&mut d, &customer, None, before, Utc::now()).unwrap(),
            CancelKind::Customer
        );

        let mut d = sample_delivery(DeliveryStatus::Scheduled);
        let after = date.and_hms_opt(9, 31, 0).unwrap();
        let err = cancel(&mut d, &customer, None, after, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::CutoffPassed { .. }));
        assert_eq!(
            cancel(&mut d, &city, Some("rain".into()), after, Utc::now()).unwrap(),
            CancelKind::Staff
        );
        assert_eq!(d.cancellation_reason.as_deref(), Some("rain"));
    }

    #[test]
    fn test_customer_cannot_cancel_someone_else() {
        let stranger = session(Role::Customer, "cust_2", None);
        let mut d = sample_delivery(DeliveryStatus::Scheduled);
        let early = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let err = cancel(&mut d, &stranger, None, early, Utc::now()).unwrap_err();
        assert!(matches!(err, LifecycleError::NotPermitted(_)));
    }

    #[test]
    fn test_only_assigned_rider_tracks_outbound_delivery() {
        let rider = session(Role::DeliveryBoy, "boy_1", Some("kit_1"));
        let other = session(Role::DeliveryBoy, "boy_2", Some("kit_1"));
        let point = GeoPoint {
            lat: 19.07,
            lng: 72.87,
        };

        let mut d = sample_delivery(DeliveryStatus::Ready);
        d.delivery_boy_id = Some("boy_1".to_string());
        let err = record_location(&mut d, point, &rider, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "invalid_state");

        d.status = DeliveryStatus::InTransit;
        assert!(record_location(&mut d, point, &other, Utc::now()).is_err());
        record_location(&mut d, point, &rider, Utc::now()).unwrap();
        assert_eq!(d.current_location, Some(point));

        let off_map = GeoPoint {
            lat: 91.0,
            lng: 72.87,
        };
        let err = record_location(&mut d, off_map, &rider, Utc::now()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(d.current_location, Some(point));
    }
}
