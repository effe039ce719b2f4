//! OAuth 2.0 + PKCE login flow against the Wikimedia REST endpoints.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::context::AppState;
use super::cookies::{
    CookieSettings, OAUTH2_FLOW_COOKIE, OAuth2FlowState, removal_cookie, transient_cookie,
};
use super::utils_session::{FlowError, establish_session, sanitize_return_to};
use crate::errors::{ProtocolError, TransientStateError};
use crate::oauth::pkce::{generate_challenge, verify_state};

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "returnTo")]
    pub return_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denies authorization
    pub error: Option<String>,
}

/// GET /auth/oauth2/login
pub async fn handle_oauth2_login(
    State(state): State<AppState>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), FlowError> {
    let challenge = generate_challenge();
    let flow = OAuth2FlowState {
        state: challenge.state.clone(),
        code_verifier: challenge.code_verifier.clone(),
        return_to: sanitize_return_to(params.return_to),
    };
    let flow_json = serde_json::to_string(&flow)
        .map_err(|_| TransientStateError::MalformedCookie(OAUTH2_FLOW_COOKIE))?;

    let settings = CookieSettings::from_config(&state.config);
    let jar = jar.add(transient_cookie(OAUTH2_FLOW_COOKIE, flow_json, &settings));

    let authorize = state.wikimedia.oauth2_authorize_url(&challenge);
    Ok((jar, Redirect::to(&authorize)))
}

/// GET /auth/oauth2/callback
pub async fn handle_oauth2_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), FlowError> {
    if let Some(error) = params.error {
        return Err(ProtocolError::ProviderDenied(error).into());
    }

    let code = params
        .code
        .ok_or(TransientStateError::MissingParameter("code"))?;
    let returned_state = params
        .state
        .ok_or(TransientStateError::MissingParameter("state"))?;

    let flow_cookie = jar
        .get(OAUTH2_FLOW_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(TransientStateError::MissingCookie(OAUTH2_FLOW_COOKIE))?;
    let flow: OAuth2FlowState = serde_json::from_str(&flow_cookie)
        .map_err(|_| TransientStateError::MalformedCookie(OAUTH2_FLOW_COOKIE))?;

    if !verify_state(&flow.state, &returned_state) {
        return Err(ProtocolError::StateMismatch.into());
    }

    let bearer = state
        .wikimedia
        .oauth2_exchange_code(&code, &flow.code_verifier)
        .await?;
    let identity = state.wikimedia.oauth2_profile(&bearer).await?;
    tracing::debug!(wikimedia_id = %identity.id, "oauth2 identity verified");

    let settings = CookieSettings::from_config(&state.config);
    let jar = jar.remove(removal_cookie(OAUTH2_FLOW_COOKIE, &settings));

    establish_session(&state, jar, identity, &headers, flow.return_to).await
}
