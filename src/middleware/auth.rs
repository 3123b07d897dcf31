// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! Resolves the caller to a [`Session`] once per request and stores it in
//! the request extensions for handlers to extract.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::services::Session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const SESSION_COOKIE: &str = "session_token";

/// Routes reachable while a password change is pending.
const PASSWORD_CHANGE_EXEMPT: [&str; 3] = ["/auth/change-password", "/auth/me", "/auth/logout"];

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
}

/// Pull the session token from the cookie, falling back to the header.
fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Check a token's signature, then its expiry against `now`.
///
/// Expiry is judged by the application clock, the same one that stamped
/// `iat` and `exp` at login.
pub fn verify_jwt(token: &str, signing_key: &[u8], now: DateTime<Utc>) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(signing_key), &validation)
        .map_err(|_| AppError::InvalidToken)?
        .claims;
    if (claims.exp as i64) <= now.timestamp() {
        return Err(AppError::InvalidToken);
    }
    Ok(claims)
}

/// Decode a token and load the user it names.
async fn session_from_token(state: &AppState, token: &str) -> Result<Session, AppError> {
    let claims = verify_jwt(token, &state.config.jwt_signing_key, state.clock.now())?;

    let user: User = state
        .store
        .get_doc(collections::USERS, &claims.sub)
        .await?
        .ok_or(AppError::InvalidToken)?;
    if !user.is_active {
        tracing::warn!(user_id = %user.user_id, "Session for deactivated user");
        return Err(AppError::InvalidToken);
    }

    Ok(Session {
        user_id: user.user_id,
        role: user.role,
        kitchen_id: user.kitchen_id,
        city: user.city,
        must_change_password: user.must_change_password,
    })
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, request.headers()).ok_or(AppError::Unauthorized)?;
    let session = session_from_token(&state, &token).await?;

    if session.must_change_password {
        let path = request.uri().path();
        if !PASSWORD_CHANGE_EXEMPT.iter().any(|p| path.ends_with(p)) {
            return Err(AppError::PasswordChangeRequired);
        }
    }

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Resolve the caller if a valid session is present; used by public routes
/// that behave differently for signed-in users.
pub async fn optional_session(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Option<Session> {
    let token = extract_token(jar, headers)?;
    session_from_token(state, &token).await.ok()
}

/// Create a JWT for a user session.
pub fn create_jwt(
    user: &User,
    signing_key: &[u8],
    ttl_days: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let iat = now.timestamp().max(0) as usize;
    let claims = Claims {
        sub: user.user_id.clone(),
        role: user.role,
        iat,
        exp: iat + (ttl_days.max(1) as usize) * 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// HttpOnly session cookie carrying `token`.
pub fn session_cookie(token: String, ttl_days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(ttl_days))
        .build()
}

/// Expired cookie that clears the session in the browser.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: Role) -> User {
        User {
            user_id: "usr_1".to_string(),
            email: Some("a@example.com".to_string()),
            phone: None,
            name: "Asha".to_string(),
            picture: None,
            role,
            kitchen_id: None,
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
    fn test_jwt_round_trip_carries_role() {
        let key = b"0123456789abcdef0123456789abcdef";
        let token = create_jwt(&user(Role::CityManager), key, 7, Utc::now()).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(key),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "usr_1");
        assert_eq!(data.claims.role, Role::CityManager);
        assert_eq!(data.claims.exp - data.claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_expiry_follows_supplied_clock() {
        use chrono::TimeZone;
        let key = b"0123456789abcdef0123456789abcdef";
        let issued = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let token = create_jwt(&user(Role::Customer), key, 7, issued).unwrap();

        let claims = verify_jwt(&token, key, issued + chrono::Duration::days(6)).unwrap();
        assert_eq!(claims.sub, "usr_1");
        assert!(matches!(
            verify_jwt(&token, key, issued + chrono::Duration::days(7)),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            verify_jwt(&token, b"another-key-another-key-another!!", issued),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_cookie_wins_over_header() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "from-cookie"));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_token(&jar, &headers).as_deref(), Some("from-cookie"));
        assert_eq!(
            extract_token(&CookieJar::new(), &headers).as_deref(),
            Some("from-header")
        );
        assert_eq!(extract_token(&CookieJar::new(), &HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), 7, true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }
}
