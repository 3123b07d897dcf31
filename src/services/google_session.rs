// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exchange of a Google sign-in session id for the user's profile.

use crate::error::AppError;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Profile returned by the session-data endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
}

pub struct GoogleSessionClient {
    http: reqwest::Client,
    session_url: String,
}

impl GoogleSessionClient {
    pub fn new(session_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building session HTTP client")?;
        Ok(Self {
            http,
            session_url: session_url.into(),
        })
    }

    /// Resolve a session id to a profile.
    ///
    /// A rejected session id is an authentication failure; transport or
    /// decoding problems are upstream failures.
    pub async fn fetch_profile(&self, session_id: &str) -> Result<GoogleProfile, AppError> {
        let response = self
            .http
            .get(&self.session_url)
            .header("X-Session-ID", session_id)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            tracing::warn!(status = status.as_u16(), "Google session rejected");
            return Err(AppError::InvalidCredentials(
                "Invalid session".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "session endpoint returned {}",
                status
            )));
        }

        let profile: GoogleProfile = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("bad session payload: {}", e)))?;

        if profile.email.trim().is_empty() {
            return Err(AppError::Upstream("session has no email".to_string()));
        }
        Ok(profile)
    }
}
