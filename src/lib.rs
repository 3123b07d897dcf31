// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FoodFleet: multi-tenant meal-subscription delivery backend
//!
//! This crate provides the REST API for kitchens, subscriptions and the
//! delivery lifecycle, plus the role-based gate the dashboards route through.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{GoogleSessionClient, SubscriptionService};
use std::sync::Arc;
use time_utils::Clock;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
    pub subscriptions: SubscriptionService,
    pub google_sessions: GoogleSessionClient,
}

impl AppState {
    /// Wire the services around a store and clock.
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        // Shared across all requests within this instance
        let locks = Arc::new(dashmap::DashMap::new());
        let subscriptions = SubscriptionService::new(
            store.clone(),
            clock.clone(),
            locks,
            config.kitchen_utc_offset_minutes,
        );
        let google_sessions = GoogleSessionClient::new(config.google_session_url.clone())?;
        Ok(Self {
            config,
            store,
            clock,
            subscriptions,
            google_sessions,
        })
    }

    /// Kitchen-local calendar date.
    pub fn today(&self) -> chrono::NaiveDate {
        self.subscriptions.today()
    }
}
