//! Application configuration loaded from environment variables.
//!
//! The session secret is read once at startup; the JWT signing key and the
//! password pepper are derived from it so that a single secret binding is
//! enough in production.

use hkdf::Hkdf;
use sha2::Sha256;
use std::env;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// India Standard Time.
const DEFAULT_KITCHEN_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Base URL under which uploaded images are served
    pub public_api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub session_ttl_days: i64,
    /// Offset of the kitchens' wall clock from UTC, used for cutoffs and "today"
    pub kitchen_utc_offset_minutes: i32,
    /// Endpoint returning `{email, name, picture}` for a Google session id
    pub google_session_url: String,
    pub max_upload_bytes: usize,

    // --- Secrets (derived from SESSION_SECRET) ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key mixed into every password hash
    pub password_pepper: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let secret = env::var("SESSION_SECRET")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("SESSION_SECRET"))?;
        if secret.len() < 32 {
            return Err(ConfigError::Invalid {
                key: "SESSION_SECRET",
                reason: "must be at least 32 bytes".to_string(),
            });
        }
        let (jwt_signing_key, password_pepper) = derive_keys(secret.as_bytes())?;

        let storage_backend = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .as_str()
        {
            "firestore" => StorageBackend::Firestore,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    reason: format!("unknown backend '{}'", other),
                })
            }
        };

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            public_api_url: env::var("PUBLIC_API_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port,
            storage_backend,
            session_ttl_days: parse_or("SESSION_TTL_DAYS", 7)?,
            kitchen_utc_offset_minutes: parse_or(
                "KITCHEN_UTC_OFFSET_MINUTES",
                DEFAULT_KITCHEN_UTC_OFFSET_MINUTES,
            )?,
            google_session_url: env::var("GOOGLE_SESSION_URL").unwrap_or_else(|_| {
                "https://demobackend.emergentagent.com/auth/v1/env/oauth/session-data".to_string()
            }),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            jwt_signing_key,
            password_pepper,
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        let (jwt_signing_key, password_pepper) =
            derive_keys(b"test_session_secret_32_bytes_min!!").unwrap_or_default();
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            public_api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            storage_backend: StorageBackend::Memory,
            session_ttl_days: 7,
            kitchen_utc_offset_minutes: DEFAULT_KITCHEN_UTC_OFFSET_MINUTES,
            google_session_url: "http://127.0.0.1:9/session-data".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            jwt_signing_key,
            password_pepper,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("cannot parse '{}'", raw),
        }),
        Err(_) => Ok(default),
    }
}

/// Split one secret into independent JWT and pepper keys.
fn derive_keys(secret: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ConfigError> {
    let hk = Hkdf::<Sha256>::new(Some(b"foodfleet"), secret);
    let mut jwt = [0u8; 32];
    let mut pepper = [0u8; 32];
    hk.expand(b"session-jwt", &mut jwt)
        .map_err(|_| ConfigError::KeyDerivation)?;
    hk.expand(b"password-pepper", &mut pepper)
        .map_err(|_| ConfigError::KeyDerivation)?;
    Ok((jwt.to_vec(), pepper.to_vec()))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Key derivation failed")]
    KeyDerivation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("SESSION_SECRET", "an_env_session_secret_of_32_bytes!!");
        env::set_var("STORAGE_BACKEND", "memory");
        env::set_var("KITCHEN_UTC_OFFSET_MINUTES", "0");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.kitchen_utc_offset_minutes, 0);
        assert_eq!(config.session_ttl_days, 7);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_ne!(config.jwt_signing_key, config.password_pepper);
    }

    #[test]
    fn test_derived_keys_are_stable() {
        let a = derive_keys(b"same secret").unwrap();
        let b = derive_keys(b"same secret").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 32);
    }
}
