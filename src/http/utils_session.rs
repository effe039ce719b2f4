//! Shared session establishment tail and flow error surface.
//!
//! Both login flows converge here after the provider has attested an
//! identity: upsert the user, persist the refresh token, then set cookies
//! and redirect. The refresh token row is written before any cookie so a
//! storage failure can never leave a browser session without its durable
//! counterpart.

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use super::context::AppState;
use super::cookies::{CookieSettings, session_cookies};
use crate::errors::{ProtocolError, StorageError, TokenError, TransientStateError};
use crate::oauth::avatar::avatar_url;
use crate::oauth::types::{NewUser, RefreshTokenRecord, WikimediaIdentity};
use crate::storage::traits::{RefreshTokenStore, UserStore};

/// Failure surfaced while driving a login flow. Browser-facing variants
/// redirect to the front end's error route; storage failures are a plain
/// 500 since no partial session exists to explain.
#[derive(Debug)]
pub enum FlowError {
    Protocol(ProtocolError),
    Transient(TransientStateError),
    Token(TokenError),
    Storage(StorageError),
}

impl From<ProtocolError> for FlowError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<TransientStateError> for FlowError {
    fn from(err: TransientStateError) -> Self {
        Self::Transient(err)
    }
}

impl From<TokenError> for FlowError {
    fn from(err: TokenError) -> Self {
        Self::Token(err)
    }
}

impl From<StorageError> for FlowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl IntoResponse for FlowError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Protocol(err) => {
                tracing::warn!("login flow provider failure: {}", err);
                "The identity provider rejected the login attempt".to_string()
            }
            Self::Transient(err) => {
                tracing::warn!("login flow state failure: {}", err);
                "The login attempt expired or was already completed".to_string()
            }
            Self::Token(err) => {
                tracing::error!("session token failure during login: {}", err);
                "Unable to establish a session".to_string()
            }
            Self::Storage(err) => {
                tracing::error!("storage failure during login: {}", err);
                return (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    axum::Json(serde_json::json!({"error": "storage unavailable"})),
                )
                    .into_response();
            }
        };

        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("message", &message)
            .finish();
        Redirect::to(&format!("/login-error?{query}")).into_response()
    }
}

/// Post-login redirect targets must stay inside this origin. Anything that
/// is not a plain absolute path falls back to the root.
pub fn sanitize_return_to(value: Option<String>) -> String {
    match value {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/".to_string(),
    }
}

/// Requesting client IP from proxy headers. First hop of x-forwarded-for,
/// then x-real-ip; absent headers mean an unknown IP, never a guess.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if forwarded.is_some() {
        return forwarded;
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Finish a login: upsert the user, stamp last_login, mint the token pair,
/// durably store the refresh token, then set the session cookies and
/// redirect to the sanitized return target.
pub async fn establish_session(
    state: &AppState,
    jar: CookieJar,
    identity: WikimediaIdentity,
    headers: &HeaderMap,
    return_to: String,
) -> Result<(CookieJar, Redirect), FlowError> {
    let avatar = identity.email.as_deref().map(avatar_url);

    let mut user = state
        .storage
        .create_user(NewUser {
            username: identity.username,
            wikimedia_id: identity.id,
            email: identity.email,
            avatar_url: avatar,
            roles: None,
        })
        .await?;

    user.last_login = Some(Utc::now());
    state.storage.update_user(&user).await?;

    let pair = state.tokens.issue_pair(&user)?;

    let record = RefreshTokenRecord {
        user_id: user.id.clone(),
        token: pair.refresh_token.clone(),
        expires_at: pair.refresh_expires_at,
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        client_ip: client_ip(headers),
        created_at: Utc::now(),
    };
    state.storage.store_refresh_token(&record).await?;

    let settings = CookieSettings::from_config(&state.config);
    let mut jar = jar;
    for cookie in session_cookies(
        &pair,
        &user,
        state.tokens.access_lifetime(),
        state.tokens.refresh_lifetime(),
        &settings,
    ) {
        jar = jar.add(cookie);
    }

    tracing::info!(user_id = %user.id, username = %user.username, "session established");

    Ok((jar, Redirect::to(&return_to)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientCredentials, Config, ConsumerCredentials};
    use crate::http::cookies::{ACCESS_COOKIE, REFRESH_COOKIE, SESSION_INFO_COOKIE};
    use crate::oauth::signature::OAuth1Signer;
    use crate::oauth::{TokenIssuer, WikimediaClient};
    use crate::storage::inmemory::MemoryAuthStorage;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn test_state(storage: Arc<MemoryAuthStorage>) -> AppState {
        let config = Arc::new(Config {
            version: "test".to_string(),
            http_port: "8080".to_string().try_into().unwrap(),
            external_base: "https://quiz.example".to_string(),
            user_agent: "quizauth-test".to_string(),
            http_client_timeout: "10s".to_string().try_into().unwrap(),
            wikimedia_base: "https://meta.wikimedia.org/w".to_string(),
            oauth1_consumer: ConsumerCredentials {
                key: "consumer-key".to_string(),
                secret: "consumer-secret".to_string(),
            },
            oauth2_client: ClientCredentials {
                id: "client-id".to_string(),
                secret: "client-secret".to_string(),
            },
            token_signing_secret: "test-signing-secret".to_string(),
            access_token_lifetime: "15m".to_string().try_into().unwrap(),
            refresh_token_lifetime: "7d".to_string().try_into().unwrap(),
            storage_backend: "memory".to_string(),
            database_url: None,
            cookie_domain: None,
            cookie_secure: "true".to_string().try_into().unwrap(),
        });
        let signer = OAuth1Signer::new("consumer-key", "consumer-secret").unwrap();
        let wikimedia = Arc::new(WikimediaClient::new(
            reqwest::Client::new(),
            config.wikimedia_base.clone(),
            signer,
            config.oauth2_client.clone(),
        ));
        let tokens = Arc::new(TokenIssuer::new(
            &config.token_signing_secret,
            config.external_base.clone(),
            *config.access_token_lifetime.as_ref(),
            *config.refresh_token_lifetime.as_ref(),
        ));
        AppState {
            config,
            storage,
            tokens,
            wikimedia,
        }
    }

    #[tokio::test]
    async fn test_establish_session_sets_cookies_and_persists() {
        use crate::storage::traits::{RefreshTokenStore, UserStore};

        let storage = Arc::new(MemoryAuthStorage::new());
        let state = test_state(storage.clone());

        let identity = WikimediaIdentity {
            id: "12345".to_string(),
            username: "WikiFan".to_string(),
            email: Some("fan@example.com".to_string()),
        };
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("test-agent"),
        );

        let (jar, redirect) = establish_session(
            &state,
            CookieJar::new(),
            identity,
            &headers,
            "/leaderboard".to_string(),
        )
        .await
        .unwrap();

        // User upserted with avatar and last_login
        let user = storage
            .get_user_by_wikimedia_id("12345")
            .await
            .unwrap()
            .unwrap();
        assert!(user.avatar_url.as_deref().unwrap().contains("gravatar"));
        assert!(user.last_login.is_some());

        // All three cookies present with the expected flags
        let access = jar.get(ACCESS_COOKIE).unwrap();
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        let refresh = jar.get(REFRESH_COOKIE).unwrap();
        assert_eq!(refresh.http_only(), Some(true));
        let info = jar.get(SESSION_INFO_COOKIE).unwrap();
        assert_ne!(info.http_only(), Some(true));

        // Refresh token durably stored under the cookie's exact value
        let record = storage
            .get_refresh_token(refresh.value())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.user_id, user.id);
        assert_eq!(record.user_agent.as_deref(), Some("test-agent"));

        // Redirect lands on the requested return path
        let response = redirect.into_response();
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::LOCATION)
                .unwrap(),
            "/leaderboard"
        );
    }

    #[test]
    fn test_sanitize_return_to() {
        assert_eq!(sanitize_return_to(Some("/quiz/7".to_string())), "/quiz/7");
        assert_eq!(sanitize_return_to(None), "/");
        assert_eq!(sanitize_return_to(Some("".to_string())), "/");
        assert_eq!(
            sanitize_return_to(Some("https://evil.example/".to_string())),
            "/"
        );
        assert_eq!(sanitize_return_to(Some("//evil.example".to_string())), "/");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("192.0.2.1"));
    }

    #[test]
    fn test_client_ip_absent_headers() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
