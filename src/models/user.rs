//! User model for storage and API.

use crate::models::{GeoPoint, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Account stored in Firestore.
///
/// Role-specific fields are optional: `kitchen_id` for kitchen and delivery
/// staff, `city` for city managers, `profile` for customers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub kitchen_id: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub google_location: Option<GeoPoint>,
    #[serde(default)]
    pub profile: Option<HealthProfile>,
    /// Salted password hash, never serialized into API responses.
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub must_change_password: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Customer health and lifestyle data used by the kitchen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthProfile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub lifestyle_diseases: Vec<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub accommodation_type: Option<String>,
}

impl HealthProfile {
    const FIELD_COUNT: u32 = 8;

    /// Percentage (0-100) of profile fields that are filled in.
    pub fn completion_percent(&self) -> u32 {
        let filled = [
            self.age.is_some(),
            self.gender.as_deref().is_some_and(|g| !g.is_empty()),
            self.height_cm.is_some(),
            self.weight_kg.is_some(),
            !self.allergies.is_empty(),
            !self.lifestyle_diseases.is_empty(),
            self.job_type.as_deref().is_some_and(|j| !j.is_empty()),
            self.accommodation_type
                .as_deref()
                .is_some_and(|a| !a.is_empty()),
        ]
        .iter()
        .filter(|f| **f)
        .count() as u32;

        filled * 100 / Self::FIELD_COUNT
    }

    /// Allergy list formatted for delivery labels.
    pub fn allergy_notes(&self) -> Option<String> {
        if self.allergies.is_empty() {
            None
        } else {
            Some(self.allergies.join(", "))
        }
    }
}

/// User as returned by the API (no password hash).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub name: String,
    pub picture: Option<String>,
    pub role: Role,
    pub kitchen_id: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub google_location: Option<GeoPoint>,
    pub profile: Option<HealthProfile>,
    pub profile_completion: u32,
    pub must_change_password: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let profile_completion = user
            .profile
            .as_ref()
            .map(HealthProfile::completion_percent)
            .unwrap_or(0);
        Self {
            user_id: user.user_id,
            email: user.email,
            phone: user.phone,
            name: user.name,
            picture: user.picture,
            role: user.role,
            kitchen_id: user.kitchen_id,
            city: user.city,
            address: user.address,
            google_location: user.google_location,
            profile: user.profile,
            profile_completion,
            must_change_password: user.must_change_password,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}
