//! OAuth 1.0a login flow against the Wikimedia provider.
//!
//! Login obtains a request token with a signed initiate call and parks the
//! token secret in a transient cookie before redirecting the browser to the
//! provider. The callback exchanges the authorized token, verifies the
//! signed identify response, and hands off to the shared session tail.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::context::AppState;
use super::cookies::{
    CookieSettings, OAUTH1_RETURN_COOKIE, OAUTH1_SECRET_COOKIE, removal_cookie, transient_cookie,
};
use super::utils_session::{FlowError, establish_session, sanitize_return_to};
use crate::errors::TransientStateError;
use crate::oauth::signature::TokenCredential;

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "returnTo")]
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
}

/// GET /auth/oauth1/login
pub async fn handle_oauth1_login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), FlowError> {
    let callback_url = format!(
        "{}/auth/oauth1/callback",
        state.config.external_base.trim_end_matches('/')
    );

    let request_token = state.wikimedia.request_token(&callback_url).await?;
    tracing::debug!(token = %request_token.key, "obtained oauth1 request token");

    let settings = CookieSettings::from_config(&state.config);
    let return_to = sanitize_return_to(params.return_to);

    let jar = jar
        .add(transient_cookie(
            OAUTH1_SECRET_COOKIE,
            request_token.secret.clone(),
            &settings,
        ))
        .add(transient_cookie(OAUTH1_RETURN_COOKIE, return_to, &settings));

    let authorize = state.wikimedia.authorize_url(&request_token.key);
    Ok((jar, Redirect::to(&authorize)))
}

/// GET /auth/oauth1/callback
pub async fn handle_oauth1_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), FlowError> {
    let oauth_token = params
        .oauth_token
        .ok_or(TransientStateError::MissingParameter("oauth_token"))?;
    let oauth_verifier = params
        .oauth_verifier
        .ok_or(TransientStateError::MissingParameter("oauth_verifier"))?;

    // An absent secret cookie means the flow expired or this callback was
    // already consumed; the exchange cannot be signed without it.
    let token_secret = jar
        .get(OAUTH1_SECRET_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(TransientStateError::MissingCookie(OAUTH1_SECRET_COOKIE))?;

    let return_to = sanitize_return_to(
        jar.get(OAUTH1_RETURN_COOKIE).map(|c| c.value().to_string()),
    );

    let request_token = TokenCredential {
        key: oauth_token,
        secret: token_secret,
    };

    let access_token = state
        .wikimedia
        .access_token(&request_token, &oauth_verifier)
        .await?;
    let identity = state.wikimedia.identify(&access_token).await?;
    tracing::debug!(wikimedia_id = %identity.id, "oauth1 identity verified");

    let settings = CookieSettings::from_config(&state.config);
    let jar = jar
        .remove(removal_cookie(OAUTH1_SECRET_COOKIE, &settings))
        .remove(removal_cookie(OAUTH1_RETURN_COOKIE, &settings));

    establish_session(&state, jar, identity, &headers, return_to).await
}
