//! Environment-based configuration types for the quizauth server runtime.

use anyhow::Result;
use std::time::Duration;

use crate::errors::ConfigError;

/// HTTP server port configuration
#[derive(Clone)]
pub struct HttpPort(u16);

/// HTTP client timeout configuration
#[derive(Clone)]
pub struct HttpClientTimeout(Duration);

/// Signed session token lifetime, parsed from the compact `<number><s|m|h|d>`
/// grammar. Malformed input is a startup failure, never a silent default.
#[derive(Clone, Copy)]
pub struct TokenLifetime(chrono::Duration);

/// Cookie `Secure` attribute configuration
#[derive(Clone, Copy)]
pub struct CookieSecure(bool);

/// OAuth 1.0a consumer credential pair
#[derive(Clone)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

/// OAuth 2.0 client credential pair
#[derive(Clone)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub external_base: String,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub wikimedia_base: String,
    pub oauth1_consumer: ConsumerCredentials,
    pub oauth2_client: ClientCredentials,
    pub token_signing_secret: String,
    pub access_token_lifetime: TokenLifetime,
    pub refresh_token_lifetime: TokenLifetime,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub cookie_domain: Option<String>,
    pub cookie_secure: CookieSecure,
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let external_base = require_env("EXTERNAL_BASE")?;
        let http_port: HttpPort = default_env("HTTP_PORT", "8080").try_into()?;
        let http_client_timeout: HttpClientTimeout =
            default_env("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let default_user_agent = format!("quizauth/{}", version()?);
        let user_agent = default_env("USER_AGENT", &default_user_agent);

        let wikimedia_base = default_env("WIKIMEDIA_BASE", "https://meta.wikimedia.org/w");
        url::Url::parse(&wikimedia_base)
            .map_err(|e| ConfigError::ProviderBaseInvalid(wikimedia_base.clone(), e))?;

        let oauth1_consumer = ConsumerCredentials {
            key: require_nonempty_env("OAUTH1_CONSUMER_KEY")?,
            secret: require_nonempty_env("OAUTH1_CONSUMER_SECRET")?,
        };
        let oauth2_client = ClientCredentials {
            id: require_nonempty_env("OAUTH2_CLIENT_ID")?,
            secret: require_nonempty_env("OAUTH2_CLIENT_SECRET")?,
        };

        let token_signing_secret = require_nonempty_env("TOKEN_SIGNING_SECRET")?;
        let access_token_lifetime: TokenLifetime =
            default_env("ACCESS_TOKEN_LIFETIME", "15m").try_into()?;
        let refresh_token_lifetime: TokenLifetime =
            default_env("REFRESH_TOKEN_LIFETIME", "7d").try_into()?;

        let storage_backend = default_env("STORAGE_BACKEND", "memory");
        let database_url = optional_env("DATABASE_URL");
        let cookie_domain = optional_env("COOKIE_DOMAIN").filter(|s| !s.is_empty());
        let cookie_secure: CookieSecure = default_env("COOKIE_SECURE", "true").try_into()?;

        Ok(Self {
            version: version()?,
            http_port,
            external_base,
            user_agent,
            http_client_timeout,
            wikimedia_base,
            oauth1_consumer,
            oauth2_client,
            token_signing_secret,
            access_token_lifetime,
            refresh_token_lifetime,
            storage_backend,
            database_url,
            cookie_domain,
            cookie_secure,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired(name.to_string()).into())
}

/// Credentials and signing secrets must never silently default or be blank.
fn require_nonempty_env(name: &str) -> Result<String> {
    let value = require_env(name)?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyCredential(name.to_string()).into());
    }
    Ok(value)
}

pub(crate) fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default_value.to_string())
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self(Duration::from_secs(10)));
        }

        // Parse duration strings like "10s", "5m", bare numbers are seconds.
        if value.ends_with('s') {
            let seconds = value
                .trim_end_matches('s')
                .parse::<u64>()
                .map_err(ConfigError::TimeoutParsingFailed)?;
            Ok(Self(Duration::from_secs(seconds)))
        } else if value.ends_with('m') {
            let minutes = value
                .trim_end_matches('m')
                .parse::<u64>()
                .map_err(ConfigError::TimeoutParsingFailed)?;
            Ok(Self(Duration::from_secs(minutes * 60)))
        } else {
            let seconds = value
                .parse::<u64>()
                .map_err(ConfigError::TimeoutParsingFailed)?;
            Ok(Self(Duration::from_secs(seconds)))
        }
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for TokenLifetime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = crate::oauth::tokens::parse_lifetime(&value)?;
        Ok(Self(duration))
    }
}

impl AsRef<chrono::Duration> for TokenLifetime {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for CookieSecure {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Self(true)),
            "false" | "0" | "no" | "off" => Ok(Self(false)),
            _ => Err(ConfigError::BoolParsingFailed(value).into()),
        }
    }
}

impl AsRef<bool> for CookieSecure {
    fn as_ref(&self) -> &bool {
        &self.0
    }
}
