//! Session endpoints: current user lookup, access token refresh, logout.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::context::AppState;
use super::cookies::{
    ACCESS_COOKIE, CookieSettings, REFRESH_COOKIE, clear_session_cookies,
    refreshed_access_cookies,
};
use crate::oauth::tokens::{TOKEN_TYPE_ACCESS, TOKEN_TYPE_REFRESH};
use crate::oauth::types::User;
use crate::storage::traits::{RefreshTokenStore, UserStore};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: String,
    username: String,
    wikimedia_id: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
    roles: Vec<String>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            wikimedia_id: user.wikimedia_id,
            email: user.email,
            avatar_url: user.avatar_url,
            roles: user.roles,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "unauthorized"})),
    )
        .into_response()
}

fn storage_unavailable() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "storage unavailable"})),
    )
        .into_response()
}

/// GET /auth/me
pub async fn handle_me(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = match jar.get(ACCESS_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return unauthorized(),
    };

    let claims = match state.tokens.verify_typed(&token, TOKEN_TYPE_ACCESS) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!("access token rejected: {}", err);
            return unauthorized();
        }
    };

    match state.storage.get_user_by_id(&claims.sub).await {
        Ok(Some(user)) => Json(UserResponse::from(user)).into_response(),
        Ok(None) => unauthorized(),
        Err(err) => {
            tracing::error!("user lookup failed: {}", err);
            storage_unavailable()
        }
    }
}

/// POST /auth/refresh
///
/// Verifies the refresh cookie, confirms the token still exists unexpired in
/// storage, and mints a fresh access token. The refresh token itself is not
/// rotated.
pub async fn handle_refresh(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = match jar.get(REFRESH_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => return unauthorized(),
    };

    let claims = match state.tokens.verify_typed(&token, TOKEN_TYPE_REFRESH) {
        Ok(claims) => claims,
        Err(err) => {
            tracing::debug!("refresh token rejected: {}", err);
            return unauthorized();
        }
    };

    // A verified cookie is not enough: the row must still exist and be
    // unexpired, so a logged-out session cannot refresh.
    let record = match state.storage.get_refresh_token(&token).await {
        Ok(Some(record)) => record,
        Ok(None) => return unauthorized(),
        Err(err) => {
            tracing::error!("refresh token lookup failed: {}", err);
            return storage_unavailable();
        }
    };

    if record.user_id != claims.sub {
        tracing::warn!("refresh token user mismatch");
        return unauthorized();
    }

    let user = match state.storage.get_user_by_id(&record.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return unauthorized(),
        Err(err) => {
            tracing::error!("user lookup failed: {}", err);
            return storage_unavailable();
        }
    };

    let (access_token, expires_at) = match state.tokens.issue_access_token(&user) {
        Ok(issued) => issued,
        Err(err) => {
            tracing::error!("access token signing failed: {}", err);
            return storage_unavailable();
        }
    };

    let settings = CookieSettings::from_config(&state.config);
    let mut jar = jar;
    for cookie in refreshed_access_cookies(
        access_token,
        &user,
        state.tokens.access_lifetime(),
        state.tokens.refresh_lifetime(),
        &settings,
    ) {
        jar = jar.add(cookie);
    }

    (
        jar,
        Json(serde_json::json!({"expiresAt": expires_at.to_rfc3339()})),
    )
        .into_response()
}

/// GET|POST /auth/logout
///
/// Deletes the stored refresh token when the cookie verifies, then clears
/// all session cookies regardless.
pub async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        let token = cookie.value().to_string();
        if state
            .tokens
            .verify_typed(&token, TOKEN_TYPE_REFRESH)
            .is_ok()
        {
            if let Err(err) = state.storage.delete_refresh_token(&token).await {
                tracing::error!("refresh token deletion failed: {}", err);
            }
        }
    }

    let settings = CookieSettings::from_config(&state.config);
    let mut jar = jar;
    for cookie in clear_session_cookies(&settings) {
        jar = jar.remove(cookie);
    }

    (jar, Redirect::to("/")).into_response()
}
