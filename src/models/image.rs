//! Uploaded images stored inline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Image bytes kept base64-encoded in the image collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    pub image_id: String,
    pub content_type: String,
    pub data_base64: String,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}
