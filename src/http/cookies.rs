//! Session and login-flow cookie construction.
//!
//! Three durable session cookies carry the signed tokens plus a small
//! JavaScript-readable info payload. Transient flow cookies hold the
//! in-flight login state between the redirect out and the callback; they
//! expire after fifteen minutes and are removed the moment they are consumed.

use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::config::Config;
use crate::oauth::tokens::TokenPair;
use crate::oauth::types::User;

pub const ACCESS_COOKIE: &str = "quizauth_access";
pub const REFRESH_COOKIE: &str = "quizauth_refresh";
/// Readable by the front end; carries no secrets.
pub const SESSION_INFO_COOKIE: &str = "quizauth_session";

pub const OAUTH1_SECRET_COOKIE: &str = "quizauth_oauth1_secret";
pub const OAUTH1_RETURN_COOKIE: &str = "quizauth_oauth1_return";
pub const OAUTH2_FLOW_COOKIE: &str = "quizauth_oauth2_flow";

const TRANSIENT_MAX_AGE: Duration = Duration::minutes(15);

/// Cookie attributes derived from configuration once at startup.
#[derive(Clone)]
pub struct CookieSettings {
    pub domain: Option<String>,
    pub secure: bool,
}

impl CookieSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            domain: config.cookie_domain.clone(),
            secure: *config.cookie_secure.as_ref(),
        }
    }
}

/// Payload of the non-HTTP-only info cookie.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub username: String,
}

/// In-flight OAuth 2.0 login state, serialized into one transient cookie.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2FlowState {
    pub state: String,
    pub code_verifier: String,
    pub return_to: String,
}

fn durable_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    http_only: bool,
    settings: &CookieSettings,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .http_only(http_only)
        .secure(settings.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build();
    if let Some(domain) = &settings.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// The three cookies set when a session is established: access token,
/// refresh token, and the readable info payload.
pub fn session_cookies(
    pair: &TokenPair,
    user: &User,
    access_lifetime: chrono::Duration,
    refresh_lifetime: chrono::Duration,
    settings: &CookieSettings,
) -> [Cookie<'static>; 3] {
    let info = SessionInfo {
        user_id: user.id.clone(),
        username: user.username.clone(),
    };
    // Serialization of two owned strings cannot fail.
    let info_json = serde_json::to_string(&info).unwrap_or_default();

    [
        durable_cookie(
            ACCESS_COOKIE,
            pair.access_token.clone(),
            Duration::seconds(access_lifetime.num_seconds()),
            true,
            settings,
        ),
        durable_cookie(
            REFRESH_COOKIE,
            pair.refresh_token.clone(),
            Duration::seconds(refresh_lifetime.num_seconds()),
            true,
            settings,
        ),
        durable_cookie(
            SESSION_INFO_COOKIE,
            info_json,
            Duration::seconds(refresh_lifetime.num_seconds()),
            false,
            settings,
        ),
    ]
}

/// Access + info cookies alone, reset when an access token is refreshed.
pub fn refreshed_access_cookies(
    access_token: String,
    user: &User,
    access_lifetime: chrono::Duration,
    refresh_lifetime: chrono::Duration,
    settings: &CookieSettings,
) -> [Cookie<'static>; 2] {
    let info = SessionInfo {
        user_id: user.id.clone(),
        username: user.username.clone(),
    };
    let info_json = serde_json::to_string(&info).unwrap_or_default();

    [
        durable_cookie(
            ACCESS_COOKIE,
            access_token,
            Duration::seconds(access_lifetime.num_seconds()),
            true,
            settings,
        ),
        durable_cookie(
            SESSION_INFO_COOKIE,
            info_json,
            Duration::seconds(refresh_lifetime.num_seconds()),
            false,
            settings,
        ),
    ]
}

/// Short-lived HTTP-only cookie holding login-in-flight state.
pub fn transient_cookie(
    name: &'static str,
    value: String,
    settings: &CookieSettings,
) -> Cookie<'static> {
    durable_cookie(name, value, TRANSIENT_MAX_AGE, true, settings)
}

/// Expired cookie that removes `name` from the browser.
pub fn removal_cookie(name: &'static str, settings: &CookieSettings) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();
    if let Some(domain) = &settings.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Removal cookies for all three session cookies.
pub fn clear_session_cookies(settings: &CookieSettings) -> [Cookie<'static>; 3] {
    [
        removal_cookie(ACCESS_COOKIE, settings),
        removal_cookie(REFRESH_COOKIE, settings),
        removal_cookie(SESSION_INFO_COOKIE, settings),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_settings() -> CookieSettings {
        CookieSettings {
            domain: None,
            secure: true,
        }
    }

    fn test_user() -> User {
        User {
            id: "01J0000000000000000000TEST".to_string(),
            username: "WikiFan".to_string(),
            wikimedia_id: Some("12345".to_string()),
            email: None,
            avatar_url: None,
            roles: vec!["user".to_string()],
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_cookie_flags() {
        let pair = TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            access_expires_at: Utc::now() + chrono::Duration::minutes(15),
            refresh_expires_at: Utc::now() + chrono::Duration::days(7),
        };
        let [access, refresh, info] = session_cookies(
            &pair,
            &test_user(),
            chrono::Duration::minutes(15),
            chrono::Duration::days(7),
            &test_settings(),
        );

        assert_eq!(access.name(), ACCESS_COOKIE);
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.path(), Some("/"));
        assert_eq!(access.max_age(), Some(Duration::minutes(15)));

        assert_eq!(refresh.http_only(), Some(true));
        assert_eq!(refresh.max_age(), Some(Duration::days(7)));

        // The info cookie must stay readable by the front end.
        assert_ne!(info.http_only(), Some(true));
        let parsed: SessionInfo = serde_json::from_str(info.value()).unwrap();
        assert_eq!(parsed.user_id, "01J0000000000000000000TEST");
        assert_eq!(parsed.username, "WikiFan");
    }

    #[test]
    fn test_flow_state_cookie_round_trip() {
        let flow = OAuth2FlowState {
            state: "a".repeat(32),
            code_verifier: "b".repeat(128),
            return_to: "/quiz/7".to_string(),
        };
        let cookie = transient_cookie(
            OAUTH2_FLOW_COOKIE,
            serde_json::to_string(&flow).unwrap(),
            &test_settings(),
        );
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(15)));

        let parsed: OAuth2FlowState = serde_json::from_str(cookie.value()).unwrap();
        assert_eq!(parsed.state, flow.state);
        assert_eq!(parsed.code_verifier, flow.code_verifier);
        assert_eq!(parsed.return_to, "/quiz/7");
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let cookie = removal_cookie(ACCESS_COOKIE, &test_settings());
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.value(), "");
    }

    #[test]
    fn test_domain_applied_when_configured() {
        let settings = CookieSettings {
            domain: Some("quiz.example".to_string()),
            secure: true,
        };
        let cookie = transient_cookie(OAUTH1_SECRET_COOKIE, "secret".to_string(), &settings);
        assert_eq!(cookie.domain(), Some("quiz.example"));
    }
}
