// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod audit;
pub mod calendar;
pub mod cutoff;
pub mod gate;
pub mod google_session;
pub mod ledger;
pub mod lifecycle;
pub mod passwords;
pub mod subscriptions;

pub use gate::{Action, GateDecision, Session};
pub use google_session::{GoogleProfile, GoogleSessionClient};
pub use lifecycle::LifecycleError;
pub use subscriptions::{SubscriptionLocks, SubscriptionService};
