// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FoodFleet API Server
//!
//! Serves the meal-subscription REST API: directory, subscriptions, the
//! delivery lifecycle and the dashboard access gate.

use foodfleet::{
    config::{Config, StorageBackend},
    db::{FirestoreStore, MemoryStore, Store},
    time_utils::SystemClock,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting FoodFleet API");

    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Firestore => Arc::new(
            FirestoreStore::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        offset_minutes = config.kitchen_utc_offset_minutes,
        "Kitchen clock configured"
    );

    // Build shared state
    let state = Arc::new(
        AppState::new(config.clone(), store, Arc::new(SystemClock))
            .expect("Failed to initialize application state"),
    );

    // Build router
    let app = foodfleet::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("foodfleet=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
