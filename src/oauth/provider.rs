//! Outbound client for the Wikimedia identity provider.
//!
//! Covers both protocol surfaces: the OAuth 1.0a endpoints under
//! `index.php?title=Special:OAuth/...` (signed requests) and the OAuth 2.0
//! REST endpoints under `rest.php/oauth2/...` (bearer tokens + PKCE). Every
//! call is a single attempt bounded by the shared client timeout; failures
//! are terminal to the login flow in progress.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::config::ClientCredentials;
use crate::errors::ProtocolError;
use crate::oauth::pkce::PkceChallenge;
use crate::oauth::signature::{OAuth1Signer, TokenCredential};
use crate::oauth::types::WikimediaIdentity;

pub struct WikimediaClient {
    http: reqwest::Client,
    /// Provider script base, e.g. `https://meta.wikimedia.org/w`
    base: String,
    signer: OAuth1Signer,
    oauth2_client: ClientCredentials,
}

#[derive(Debug, Deserialize)]
struct OAuth1TokenResponse {
    key: String,
    secret: String,
}

/// Claims of the signed identify response. MediaWiki signs this JWT with the
/// consumer secret (HS256) and addresses it to the consumer key.
#[derive(Debug, Deserialize)]
struct IdentifyClaims {
    sub: serde_json::Value,
    username: String,
    email: Option<String>,
    #[allow(dead_code)]
    iss: String,
}

#[derive(Debug, Deserialize)]
struct OAuth2TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuth2Profile {
    sub: serde_json::Value,
    username: String,
    email: Option<String>,
}

impl WikimediaClient {
    pub fn new(
        http: reqwest::Client,
        base: String,
        signer: OAuth1Signer,
        oauth2_client: ClientCredentials,
    ) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            signer,
            oauth2_client,
        }
    }

    fn special_oauth_url(&self, action: &str) -> String {
        format!(
            "{}/index.php?title=Special:OAuth/{}&format=json",
            self.base, action
        )
    }

    /// Origin of the provider base, used as the expected issuer of the
    /// identify JWT.
    fn provider_origin(&self) -> String {
        match url::Url::parse(&self.base) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => format!("{}://{}", parsed.scheme(), host),
                None => self.base.clone(),
            },
            Err(_) => self.base.clone(),
        }
    }

    // ===== OAuth 1.0a =====

    /// Obtain an unauthorized request token (signed, tokenless call).
    pub async fn request_token(
        &self,
        callback_url: &str,
    ) -> Result<TokenCredential, ProtocolError> {
        let url = self.special_oauth_url("initiate");
        let authorization = self.signer.authorization_header(
            "GET",
            &url,
            None,
            &[("oauth_callback", callback_url)],
        )?;

        let response = self.send_signed("initiate", &url, authorization).await?;
        let token: OAuth1TokenResponse = serde_json::from_str(&response)
            .map_err(|e| ProtocolError::MalformedResponse("initiate", e.to_string()))?;
        Ok(TokenCredential {
            key: token.key,
            secret: token.secret,
        })
    }

    /// URL the browser is redirected to for user authorization.
    pub fn authorize_url(&self, request_token_key: &str) -> String {
        let mut url = url::Url::parse(&format!("{}/index.php", self.base))
            .expect("provider base validated at startup");
        url.query_pairs_mut()
            .append_pair("title", "Special:OAuth/authorize")
            .append_pair("oauth_token", request_token_key)
            .append_pair("oauth_consumer_key", self.signer.consumer_key());
        url.to_string()
    }

    /// Exchange the authorized request token + verifier for an access token.
    pub async fn access_token(
        &self,
        request_token: &TokenCredential,
        verifier: &str,
    ) -> Result<TokenCredential, ProtocolError> {
        let url = self.special_oauth_url("token");
        let authorization = self.signer.authorization_header(
            "GET",
            &url,
            Some(request_token),
            &[("oauth_verifier", verifier)],
        )?;

        let response = self.send_signed("token", &url, authorization).await?;
        let token: OAuth1TokenResponse = serde_json::from_str(&response)
            .map_err(|e| ProtocolError::MalformedResponse("token", e.to_string()))?;
        Ok(TokenCredential {
            key: token.key,
            secret: token.secret,
        })
    }

    /// Fetch the signed identify response and verify it against the consumer
    /// secret, issuer, and audience before trusting any claim in it.
    pub async fn identify(
        &self,
        access_token: &TokenCredential,
    ) -> Result<WikimediaIdentity, ProtocolError> {
        let url = self.special_oauth_url("identify");
        let authorization =
            self.signer
                .authorization_header("GET", &url, Some(access_token), &[])?;

        let body = self.send_signed("identify", &url, authorization).await?;
        let jwt = body.trim();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.signer.consumer_key()]);
        validation.set_issuer(&[&self.provider_origin()]);

        let decoding_key = DecodingKey::from_secret(self.signer.consumer_secret().as_bytes());
        let claims = decode::<IdentifyClaims>(jwt, &decoding_key, &validation)
            .map_err(|e| ProtocolError::IdentifyVerificationFailed(e.to_string()))?
            .claims;

        let id = normalize_subject(&claims.sub).ok_or_else(|| {
            ProtocolError::MalformedResponse("identify", "missing sub claim".to_string())
        })?;

        Ok(WikimediaIdentity {
            id,
            username: claims.username,
            email: claims.email.filter(|e| !e.is_empty()),
        })
    }

    async fn send_signed(
        &self,
        endpoint: &'static str,
        url: &str,
        authorization: String,
    ) -> Result<String, ProtocolError> {
        let response = self
            .http
            .get(url)
            .header(http::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| ProtocolError::RequestFailed(endpoint, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::ExchangeRejected(endpoint, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ProtocolError::MalformedResponse(endpoint, e.to_string()))
    }

    // ===== OAuth 2.0 + PKCE =====

    /// Authorization URL carrying the PKCE challenge and state.
    pub fn oauth2_authorize_url(&self, challenge: &PkceChallenge) -> String {
        let mut url = url::Url::parse(&format!("{}/rest.php/oauth2/authorize", self.base))
            .expect("provider base validated at startup");
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.oauth2_client.id)
            .append_pair("state", &challenge.state)
            .append_pair("code_challenge", &challenge.code_challenge)
            .append_pair("code_challenge_method", "S256");
        url.to_string()
    }

    /// Exchange an authorization code + verifier for a bearer access token.
    pub async fn oauth2_exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<String, ProtocolError> {
        let url = format!("{}/rest.php/oauth2/access_token", self.base);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.oauth2_client.id),
                ("client_secret", &self.oauth2_client.secret),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await
            .map_err(|e| ProtocolError::RequestFailed("oauth2/access_token", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::ExchangeRejected(
                "oauth2/access_token",
                status.as_u16(),
            ));
        }

        let token: OAuth2TokenResponse = response.json().await.map_err(|e| {
            ProtocolError::MalformedResponse("oauth2/access_token", e.to_string())
        })?;
        Ok(token.access_token)
    }

    /// Fetch the user profile with a bearer token.
    pub async fn oauth2_profile(
        &self,
        bearer_token: &str,
    ) -> Result<WikimediaIdentity, ProtocolError> {
        let url = format!("{}/rest.php/oauth2/resource/profile", self.base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| ProtocolError::RequestFailed("oauth2/profile", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProtocolError::ExchangeRejected(
                "oauth2/profile",
                status.as_u16(),
            ));
        }

        let profile: OAuth2Profile = response
            .json()
            .await
            .map_err(|e| ProtocolError::MalformedResponse("oauth2/profile", e.to_string()))?;

        let id = normalize_subject(&profile.sub).ok_or_else(|| {
            ProtocolError::MalformedResponse("oauth2/profile", "missing sub claim".to_string())
        })?;

        Ok(WikimediaIdentity {
            id,
            username: profile.username,
            email: profile.email.filter(|e| !e.is_empty()),
        })
    }
}

/// MediaWiki serializes the central user id as either a JSON number or a
/// string depending on endpoint; normalize both to a string.
fn normalize_subject(sub: &serde_json::Value) -> Option<String> {
    match sub {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::pkce::generate_challenge;

    fn test_client() -> WikimediaClient {
        let signer = OAuth1Signer::new("consumer-key", "consumer-secret").unwrap();
        WikimediaClient::new(
            reqwest::Client::new(),
            "https://meta.wikimedia.org/w".to_string(),
            signer,
            ClientCredentials {
                id: "client-id".to_string(),
                secret: "client-secret".to_string(),
            },
        )
    }

    #[test]
    fn test_authorize_url() {
        let client = test_client();
        let url = client.authorize_url("request-token-key");
        assert!(url.starts_with("https://meta.wikimedia.org/w/index.php?"));
        assert!(url.contains("title=Special%3AOAuth%2Fauthorize"));
        assert!(url.contains("oauth_token=request-token-key"));
        assert!(url.contains("oauth_consumer_key=consumer-key"));
    }

    #[test]
    fn test_oauth2_authorize_url() {
        let client = test_client();
        let challenge = generate_challenge();
        let url = client.oauth2_authorize_url(&challenge);
        assert!(url.starts_with("https://meta.wikimedia.org/w/rest.php/oauth2/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains(&format!("state={}", challenge.state)));
        assert!(url.contains(&format!("code_challenge={}", challenge.code_challenge)));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn test_provider_origin() {
        let client = test_client();
        assert_eq!(client.provider_origin(), "https://meta.wikimedia.org");
    }

    #[test]
    fn test_normalize_subject() {
        assert_eq!(
            normalize_subject(&serde_json::json!("12345")),
            Some("12345".to_string())
        );
        assert_eq!(
            normalize_subject(&serde_json::json!(12345)),
            Some("12345".to_string())
        );
        assert_eq!(normalize_subject(&serde_json::json!("")), None);
        assert_eq!(normalize_subject(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_identify_rejects_unsigned_token() {
        // A token signed with a different secret must not verify.
        let claims = serde_json::json!({
            "iss": "https://meta.wikimedia.org",
            "aud": "consumer-key",
            "sub": 12345,
            "username": "WikiFan",
            "exp": chrono::Utc::now().timestamp() + 60,
        });
        let forged = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"wrong-secret"),
        )
        .unwrap();

        let client = test_client();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&["consumer-key"]);
        validation.set_issuer(&[client.provider_origin()]);
        let key = DecodingKey::from_secret(client.signer.consumer_secret().as_bytes());
        assert!(decode::<IdentifyClaims>(&forged, &key, &validation).is_err());
    }
}
