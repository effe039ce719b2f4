//! Session token issuing and verification.
//!
//! Mints HS256-signed access/refresh token pairs bound to an explicit
//! issuer/audience pair, with distinct short/long lifetimes. Verification
//! fails closed on any signature, expiry, issuer, audience, or type mismatch.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, TokenError};
use crate::oauth::types::User;

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Audience claim pinned into every session token. Prevents tokens minted by
/// another application sharing the signing secret from being accepted here.
pub const TOKEN_AUDIENCE: &str = "quizauth-session";

/// Claims carried by both access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Internal user id
    pub sub: String,
    pub username: String,
    pub wikimedia_id: Option<String>,
    pub roles: Vec<String>,
    /// "access" or "refresh"
    pub typ: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted access/refresh pair with absolute expiry timestamps.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_lifetime: chrono::Duration,
    refresh_lifetime: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(
        signing_secret: &str,
        issuer: String,
        access_lifetime: chrono::Duration,
        refresh_lifetime: chrono::Duration,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_secret.as_bytes()),
            issuer,
            access_lifetime,
            refresh_lifetime,
        }
    }

    pub fn access_lifetime(&self) -> chrono::Duration {
        self.access_lifetime
    }

    pub fn refresh_lifetime(&self) -> chrono::Duration {
        self.refresh_lifetime
    }

    /// Mint an access/refresh pair for a user.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, TokenError> {
        let access_expires_at = expiry_from(self.access_lifetime);
        let refresh_expires_at = expiry_from(self.refresh_lifetime);

        let access_token = self.sign(user, TOKEN_TYPE_ACCESS, access_expires_at)?;
        let refresh_token = self.sign(user, TOKEN_TYPE_REFRESH, refresh_expires_at)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    /// Mint a standalone access token, used when refreshing a session.
    pub fn issue_access_token(
        &self,
        user: &User,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let expires_at = expiry_from(self.access_lifetime);
        let token = self.sign(user, TOKEN_TYPE_ACCESS, expires_at)?;
        Ok((token, expires_at))
    }

    fn sign(
        &self,
        user: &User,
        typ: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = SessionClaims {
            sub: user.id.clone(),
            username: user.username.clone(),
            wikimedia_id: user.wikimedia_id.clone(),
            roles: user.roles.clone(),
            typ: typ.to_string(),
            iss: self.issuer.clone(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::SigningFailed(e.to_string()))
    }

    /// Verify signature, expiry, issuer, and audience. Returns the claims or
    /// fails; there is no partially-trusted outcome.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.validate_exp = true;
        // A token expired by one second is expired.
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::VerificationFailed(e.to_string()))
    }

    /// Verify and additionally require the expected `typ` claim, so an access
    /// token can never stand in for a refresh token or vice versa.
    pub fn verify_typed(
        &self,
        token: &str,
        expected_typ: &'static str,
    ) -> Result<SessionClaims, TokenError> {
        let claims = self.verify(token)?;
        if claims.typ != expected_typ {
            return Err(TokenError::WrongType(expected_typ, claims.typ));
        }
        Ok(claims)
    }
}

/// Parse a compact lifetime string matching `^(\d+)([smhd])$` into a
/// duration. Anything else is a fatal configuration error.
pub fn parse_lifetime(value: &str) -> Result<chrono::Duration, ConfigError> {
    if value.len() < 2 {
        return Err(ConfigError::LifetimeParsingFailed(value.to_string()));
    }
    let (count, unit) = value.split_at(value.len() - 1);
    if !count.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::LifetimeParsingFailed(value.to_string()));
    }
    let count: i64 = count
        .parse()
        .map_err(|_| ConfigError::LifetimeParsingFailed(value.to_string()))?;

    match unit {
        "s" => Ok(chrono::Duration::seconds(count)),
        "m" => Ok(chrono::Duration::minutes(count)),
        "h" => Ok(chrono::Duration::hours(count)),
        "d" => Ok(chrono::Duration::days(count)),
        _ => Err(ConfigError::LifetimeParsingFailed(value.to_string())),
    }
}

/// Absolute expiry timestamp for a lifetime, relative to now.
pub fn expiry_from(lifetime: chrono::Duration) -> DateTime<Utc> {
    Utc::now() + lifetime
}
