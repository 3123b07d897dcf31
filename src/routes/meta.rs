// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Option lists for client forms, city lookup and image uploads.

use crate::config::Config;
use crate::db::{collections, Query};
use crate::error::{AppError, Result};
use crate::models::{DeliveryDay, Kitchen, MealPeriod, PlanType, Role, StoredImage};
use crate::routes::{load, new_id};
use crate::services::cutoff::cutoff_display;
use crate::services::Session;
use crate::AppState;
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Cities offered before any kitchen has been registered there.
const DEFAULT_CITIES: [&str; 2] = ["Kochi", "Trivandrum"];
const ALLERGIES: [&str; 8] = [
    "Peanuts",
    "Tree nuts",
    "Milk",
    "Eggs",
    "Fish",
    "Shellfish",
    "Soy",
    "Gluten",
];
const LIFESTYLE_DISEASES: [&str; 6] = [
    "Diabetes",
    "Hypertension",
    "High cholesterol",
    "Thyroid",
    "PCOS",
    "Obesity",
];
const MEAL_CATEGORIES: [&str; 6] = ["main", "side", "bread", "rice", "curry", "dessert"];
const JOB_TYPES: [&str; 5] = ["desk", "field", "manual", "student", "home"];
const ACCOMMODATION_TYPES: [&str; 4] = ["home", "pg", "hostel", "office"];
const DIET_TYPES: [&str; 4] = ["veg", "non_veg", "mixed", "breakfast_only"];
const IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/constants", get(constants))
        .route("/api/cities", get(cities))
        .route("/api/images/{id}", get(get_image))
}

pub fn routes(config: &Config) -> Router<Arc<AppState>> {
    // Base64 inflates the payload by a third; leave room for the JSON wrapper.
    let body_limit = config.max_upload_bytes / 3 * 4 + 4096;
    Router::new().route(
        "/api/upload-image",
        post(upload_image).layer(DefaultBodyLimit::max(body_limit)),
    )
}

// ─── Constants ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct MealPeriodOption {
    pub value: MealPeriod,
    pub cutoff_display: &'static str,
}

#[derive(Serialize)]
pub struct TimeWindow {
    pub meal_period: MealPeriod,
    pub window: &'static str,
}

#[derive(Serialize)]
pub struct Constants {
    pub roles: Vec<Role>,
    pub cities: Vec<&'static str>,
    pub allergies: Vec<&'static str>,
    pub lifestyle_diseases: Vec<&'static str>,
    pub meal_categories: Vec<&'static str>,
    pub plan_types: Vec<PlanType>,
    pub diet_types: Vec<&'static str>,
    pub delivery_days: Vec<DeliveryDay>,
    pub job_types: Vec<&'static str>,
    pub accommodation_types: Vec<&'static str>,
    pub meal_periods: Vec<MealPeriodOption>,
    pub delivery_time_windows: Vec<TimeWindow>,
}

fn delivery_window(period: MealPeriod) -> &'static str {
    match period {
        MealPeriod::Breakfast => "7:00 AM - 9:00 AM",
        MealPeriod::Lunch => "12:00 PM - 2:00 PM",
        MealPeriod::Dinner => "7:00 PM - 9:00 PM",
    }
}

async fn constants() -> Json<Constants> {
    Json(Constants {
        roles: Role::ALL.to_vec(),
        cities: DEFAULT_CITIES.to_vec(),
        allergies: ALLERGIES.to_vec(),
        lifestyle_diseases: LIFESTYLE_DISEASES.to_vec(),
        meal_categories: MEAL_CATEGORIES.to_vec(),
        plan_types: vec![PlanType::Weekly, PlanType::FifteenDay, PlanType::Monthly],
        diet_types: DIET_TYPES.to_vec(),
        delivery_days: DeliveryDay::WORKING_WEEK.to_vec(),
        job_types: JOB_TYPES.to_vec(),
        accommodation_types: ACCOMMODATION_TYPES.to_vec(),
        meal_periods: MealPeriod::ALL
            .into_iter()
            .map(|value| MealPeriodOption {
                value,
                cutoff_display: cutoff_display(value),
            })
            .collect(),
        delivery_time_windows: MealPeriod::ALL
            .into_iter()
            .map(|meal_period| TimeWindow {
                meal_period,
                window: delivery_window(meal_period),
            })
            .collect(),
    })
}

/// Distinct cities that currently have an active kitchen.
async fn cities(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    let kitchens: Vec<Kitchen> = state
        .store
        .query_docs(collections::KITCHENS, &Query::new().eq("is_active", true))
        .await?;
    let cities: BTreeSet<String> = kitchens.into_iter().map(|k| k.city).collect();
    Ok(Json(cities.into_iter().collect()))
}

// ─── Images ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UploadRequest {
    image: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Split `data:<mime>;base64,<payload>` into its content type and bytes.
fn parse_data_url(data_url: &str) -> Result<(String, Vec<u8>)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::BadRequest("Image must be a data URL".to_string()))?;
    let (content_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| AppError::BadRequest("Image must be base64-encoded".to_string()))?;

    let content_type = content_type.to_ascii_lowercase();
    if !IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported image type '{}'",
            content_type
        )));
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::BadRequest("Image data is not valid base64".to_string()))?;
    Ok((content_type, bytes))
}

async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>> {
    let (content_type, bytes) = parse_data_url(&req.image)?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Image is empty".to_string()));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::BadRequest(format!(
            "Image exceeds {} bytes",
            state.config.max_upload_bytes
        )));
    }

    let image = StoredImage {
        image_id: new_id("img"),
        content_type,
        data_base64: STANDARD.encode(&bytes),
        uploaded_by: session.user_id.clone(),
        created_at: state.clock.now(),
    };
    state
        .store
        .put_doc(collections::IMAGES, &image.image_id, &image)
        .await?;

    tracing::info!(
        image_id = %image.image_id,
        size = bytes.len(),
        user_id = %session.user_id,
        "Image uploaded"
    );
    Ok(Json(UploadResponse {
        url: format!(
            "{}/api/images/{}",
            state.config.public_api_url.trim_end_matches('/'),
            image.image_id
        ),
    }))
}

async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let image: StoredImage = load(state.store.as_ref(), collections::IMAGES, &id, "Image").await?;
    let bytes = STANDARD
        .decode(&image.data_base64)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Corrupt image {}: {}", id, e)))?;
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        let (content_type, bytes) = parse_data_url("data:image/PNG;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_parse_data_url_rejects_other_types() {
        assert!(parse_data_url("data:image/gif;base64,R0lGODlh").is_err());
        assert!(parse_data_url("data:text/html;base64,PGgxPg==").is_err());
        assert!(parse_data_url("iVBORw0KGgo=").is_err());
        assert!(parse_data_url("data:image/png;base64,***").is_err());
    }
}
