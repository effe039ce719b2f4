//! OAuth 1.0a HMAC-SHA1 request signing (RFC 5849).
//!
//! Builds ready-to-send `Authorization` header values for the provider's
//! initiate, token, and identify endpoints. Pure function of the request
//! descriptor plus the consumer/token secrets.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::RngCore;
use sha1::Sha1;

use crate::errors::{ConfigError, ProtocolError};

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn oauth_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// A provider-issued token credential (request token or access token).
#[derive(Debug, Clone)]
pub struct TokenCredential {
    pub key: String,
    pub secret: String,
}

/// Signs outbound OAuth 1.0a requests with the configured consumer credential.
#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
}

impl OAuth1Signer {
    /// Absent consumer credentials are a fatal misconfiguration, caught at
    /// construction rather than per request.
    pub fn new(consumer_key: &str, consumer_secret: &str) -> Result<Self, ConfigError> {
        if consumer_key.trim().is_empty() {
            return Err(ConfigError::EmptyCredential("OAUTH1_CONSUMER_KEY".to_string()));
        }
        if consumer_secret.trim().is_empty() {
            return Err(ConfigError::EmptyCredential(
                "OAUTH1_CONSUMER_SECRET".to_string(),
            ));
        }
        Ok(Self {
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
        })
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }

    /// Build the `Authorization` header for a request.
    ///
    /// `extra_params` carries additional request parameters that participate
    /// in the signature; entries with an `oauth_` prefix (such as
    /// `oauth_callback` or `oauth_verifier`) are also emitted in the header.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        token: Option<&TokenCredential>,
        extra_params: &[(&str, &str)],
    ) -> Result<String, ProtocolError> {
        let mut nonce_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.header_with(method, url, token, extra_params, &nonce, &timestamp)
    }

    fn header_with(
        &self,
        method: &str,
        url: &str,
        token: Option<&TokenCredential>,
        extra_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, ProtocolError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ProtocolError::RequestFailed("sign", e.to_string()))?;

        // Normalized base URL: scheme://host[:non-default-port]/path
        let host = parsed
            .host_str()
            .ok_or_else(|| ProtocolError::RequestFailed("sign", "URL has no host".to_string()))?;
        let port = match parsed.port() {
            Some(port) => format!(":{port}"),
            None => String::new(),
        };
        let base_url = format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path());

        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                "HMAC-SHA1".to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = token {
            oauth_params.push(("oauth_token".to_string(), token.key.clone()));
        }
        for (key, value) in extra_params {
            if key.starts_with("oauth_") {
                oauth_params.push((key.to_string(), value.to_string()));
            }
        }

        // The signature covers the query string, any extra request
        // parameters, and all oauth_* parameters.
        let mut params: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.extend(oauth_params.iter().cloned());
        for (key, value) in extra_params {
            if !key.starts_with("oauth_") {
                params.push((key.to_string(), value.to_string()));
            }
        }

        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (oauth_encode(k), oauth_encode(v)))
            .collect();
        encoded.sort();
        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            oauth_encode(&base_url),
            oauth_encode(&param_string)
        );

        let token_secret = token.map(|t| t.secret.as_str()).unwrap_or("");
        let signing_key = format!(
            "{}&{}",
            oauth_encode(&self.consumer_secret),
            oauth_encode(token_secret)
        );

        let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
            .map_err(|e| ProtocolError::RequestFailed("sign", e.to_string()))?;
        mac.update(base_string.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();
        let rendered = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, oauth_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {rendered}"))
    }
}
