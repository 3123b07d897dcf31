// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard routing decisions for the client.

use crate::middleware::optional_session;
use crate::services::gate::{self, GateDecision};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/gate", get(evaluate))
}

#[derive(Deserialize)]
struct GateQuery {
    path: String,
}

/// Evaluate a client path for the caller; a missing or invalid session is
/// treated as signed out.
async fn evaluate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<GateQuery>,
) -> Json<GateDecision> {
    let session = optional_session(&state, &jar, &headers).await;
    Json(gate::evaluate(session.as_ref(), &query.path))
}
