//! Login flow integration tests
//!
//! Drives the real router with axum-test against the in-memory storage
//! backend. The halves of each flow that call out to the provider are
//! covered by unit tests on the provider client; everything reachable
//! without a network round trip is exercised here.

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use std::sync::Arc;

use quizauth::config::{ClientCredentials, Config, ConsumerCredentials};
use quizauth::http::cookies::{
    ACCESS_COOKIE, OAUTH2_FLOW_COOKIE, OAuth2FlowState, REFRESH_COOKIE, SESSION_INFO_COOKIE,
};
use quizauth::http::{AppState, build_router};
use quizauth::oauth::signature::OAuth1Signer;
use quizauth::oauth::types::{NewUser, RefreshTokenRecord, User};
use quizauth::oauth::{TokenIssuer, WikimediaClient};
use quizauth::storage::inmemory::MemoryAuthStorage;
use quizauth::storage::traits::{RefreshTokenStore, UserStore};

fn test_config() -> Arc<Config> {
    Arc::new(Config {
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
    })
}

fn test_state() -> (AppState, Arc<MemoryAuthStorage>) {
    let config = test_config();
    let storage = Arc::new(MemoryAuthStorage::new());

    let signer =
        OAuth1Signer::new(&config.oauth1_consumer.key, &config.oauth1_consumer.secret).unwrap();
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

    let state = AppState {
        config,
        storage: storage.clone(),
        tokens,
        wikimedia,
    };
    (state, storage)
}

fn test_server() -> (TestServer, AppState, Arc<MemoryAuthStorage>) {
    let (state, storage) = test_state();
    let server = TestServer::new(build_router(state.clone())).unwrap();
    (server, state, storage)
}

async fn seeded_user(storage: &MemoryAuthStorage) -> User {
    storage
        .create_user(NewUser {
            username: "WikiFan".to_string(),
            wikimedia_id: "12345".to_string(),
            email: Some("fan@example.com".to_string()),
            avatar_url: None,
            roles: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let (server, _, _) = test_server();
    let response = server.get("/healthz").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], "test");
}

#[tokio::test]
async fn test_oauth2_login_redirects_with_challenge() {
    let (server, _, _) = test_server();

    let response = server
        .get("/auth/oauth2/login")
        .add_query_param("returnTo", "/quiz/7")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let location = response
        .header("location")
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with("https://meta.wikimedia.org/w/rest.php/oauth2/authorize?"));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("client_id=client-id"));
    assert!(location.contains("code_challenge_method=S256"));
    assert!(location.contains("code_challenge="));

    // The transient cookie must carry the same state the provider sees.
    let cookie = response.cookie(OAUTH2_FLOW_COOKIE);
    let flow: OAuth2FlowState = serde_json::from_str(cookie.value()).unwrap();
    assert_eq!(flow.return_to, "/quiz/7");
    assert_eq!(flow.state.len(), 32);
    assert_eq!(flow.code_verifier.len(), 128);
    assert!(location.contains(&format!("state={}", flow.state)));
}

#[tokio::test]
async fn test_oauth2_login_rejects_offsite_return_to() {
    let (server, _, _) = test_server();

    let response = server
        .get("/auth/oauth2/login")
        .add_query_param("returnTo", "https://evil.example/phish")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let cookie = response.cookie(OAUTH2_FLOW_COOKIE);
    let flow: OAuth2FlowState = serde_json::from_str(cookie.value()).unwrap();
    assert_eq!(flow.return_to, "/");
}

#[tokio::test]
async fn test_oauth2_callback_state_mismatch_is_terminal() {
    let (server, _, storage) = test_server();

    let flow = OAuth2FlowState {
        state: "a".repeat(32),
        code_verifier: "b".repeat(128),
        return_to: "/".to_string(),
    };
    let response = server
        .get("/auth/oauth2/callback")
        .add_query_param("code", "authorization-code")
        .add_query_param("state", "c".repeat(32))
        .add_cookie(Cookie::new(
            OAUTH2_FLOW_COOKIE,
            serde_json::to_string(&flow).unwrap(),
        ))
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.header("location").to_str().unwrap().to_string();
    assert!(location.starts_with("/login-error?"));

    // No session, no user row.
    assert!(
        storage
            .get_user_by_wikimedia_id("12345")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_oauth2_callback_without_flow_cookie_fails() {
    let (server, _, _) = test_server();

    // A replayed callback arrives after the transient cookie was consumed.
    let response = server
        .get("/auth/oauth2/callback")
        .add_query_param("code", "authorization-code")
        .add_query_param("state", "a".repeat(32))
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.header("location").to_str().unwrap().to_string();
    assert!(location.starts_with("/login-error?"));
}

#[tokio::test]
async fn test_oauth2_callback_provider_denial() {
    let (server, _, _) = test_server();

    let response = server
        .get("/auth/oauth2/callback")
        .add_query_param("error", "access_denied")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.header("location").to_str().unwrap().to_string();
    assert!(location.starts_with("/login-error?"));
}

#[tokio::test]
async fn test_oauth1_callback_without_secret_cookie_fails() {
    let (server, _, _) = test_server();

    let response = server
        .get("/auth/oauth1/callback")
        .add_query_param("oauth_token", "request-token")
        .add_query_param("oauth_verifier", "verifier")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.header("location").to_str().unwrap().to_string();
    assert!(location.starts_with("/login-error?"));
}

#[tokio::test]
async fn test_me_requires_access_cookie() {
    let (server, _, _) = test_server();
    let response = server.get("/auth/me").await;
    response.assert_status_unauthorized();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_me_returns_user_with_valid_access_token() {
    let (server, state, storage) = test_server();
    let user = seeded_user(&storage).await;
    let pair = state.tokens.issue_pair(&user).unwrap();

    let response = server
        .get("/auth/me")
        .add_cookie(Cookie::new(ACCESS_COOKIE, pair.access_token))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["id"], user.id);
    assert_eq!(body["username"], "WikiFan");
    assert_eq!(body["wikimediaId"], "12345");
    assert_eq!(body["roles"], serde_json::json!(["user"]));
}

#[tokio::test]
async fn test_me_rejects_refresh_token_in_access_cookie() {
    let (server, state, storage) = test_server();
    let user = seeded_user(&storage).await;
    let pair = state.tokens.issue_pair(&user).unwrap();

    let response = server
        .get("/auth/me")
        .add_cookie(Cookie::new(ACCESS_COOKIE, pair.refresh_token))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_refresh_mints_new_access_token() {
    let (server, state, storage) = test_server();
    let user = seeded_user(&storage).await;
    let pair = state.tokens.issue_pair(&user).unwrap();

    storage
        .store_refresh_token(&RefreshTokenRecord {
            user_id: user.id.clone(),
            token: pair.refresh_token.clone(),
            expires_at: pair.refresh_expires_at,
            user_agent: None,
            client_ip: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let response = server
        .post("/auth/refresh")
        .add_cookie(Cookie::new(REFRESH_COOKIE, pair.refresh_token))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert!(body["expiresAt"].is_string());

    let access = response.cookie(ACCESS_COOKIE);
    let claims = state
        .tokens
        .verify_typed(access.value(), "access")
        .unwrap();
    assert_eq!(claims.sub, user.id);
}

#[tokio::test]
async fn test_refresh_rejects_unknown_refresh_token() {
    let (server, state, storage) = test_server();
    let user = seeded_user(&storage).await;
    let pair = state.tokens.issue_pair(&user).unwrap();

    // Valid signature but no stored row, as after logout.
    let response = server
        .post("/auth/refresh")
        .add_cookie(Cookie::new(REFRESH_COOKIE, pair.refresh_token))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_refresh_rejects_expired_stored_token() {
    let (server, state, storage) = test_server();
    let user = seeded_user(&storage).await;
    let pair = state.tokens.issue_pair(&user).unwrap();

    storage
        .store_refresh_token(&RefreshTokenRecord {
            user_id: user.id.clone(),
            token: pair.refresh_token.clone(),
            expires_at: Utc::now() - Duration::seconds(1),
            user_agent: None,
            client_ip: None,
            created_at: Utc::now() - Duration::days(8),
        })
        .await
        .unwrap();

    let response = server
        .post("/auth/refresh")
        .add_cookie(Cookie::new(REFRESH_COOKIE, pair.refresh_token))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_logout_deletes_refresh_token_and_clears_cookies() {
    let (server, state, storage) = test_server();
    let user = seeded_user(&storage).await;
    let pair = state.tokens.issue_pair(&user).unwrap();

    storage
        .store_refresh_token(&RefreshTokenRecord {
            user_id: user.id.clone(),
            token: pair.refresh_token.clone(),
            expires_at: pair.refresh_expires_at,
            user_agent: None,
            client_ip: None,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let response = server
        .post("/auth/logout")
        .add_cookie(Cookie::new(REFRESH_COOKIE, pair.refresh_token.clone()))
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("location").to_str().unwrap(), "/");

    // The durable row is gone so the session cannot be refreshed again.
    assert!(
        storage
            .get_refresh_token(&pair.refresh_token)
            .await
            .unwrap()
            .is_none()
    );

    for name in [ACCESS_COOKIE, REFRESH_COOKIE, SESSION_INFO_COOKIE] {
        let cleared = response.cookie(name);
        assert_eq!(cleared.value(), "");
    }
}
