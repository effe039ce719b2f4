//! Standardized error types following the `error-quizauth-<domain>-<number>` format.

use thiserror::Error;

/// Configuration errors that occur during application startup
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error when a required environment variable is not set
    #[error("error-quizauth-config-1 {0} must be set")]
    EnvVarRequired(String),

    /// Error when HTTP_PORT cannot be parsed
    #[error("error-quizauth-config-2 Parsing HTTP_PORT into u16 failed: {0:?}")]
    PortParsingFailed(std::num::ParseIntError),

    /// Error when version information is not available
    #[error("error-quizauth-config-3 One of GIT_HASH or CARGO_PKG_VERSION must be set")]
    VersionNotSet,

    /// Error when HTTP client timeout cannot be parsed
    #[error("error-quizauth-config-4 Failed to parse HTTP client timeout: {0}")]
    TimeoutParsingFailed(std::num::ParseIntError),

    /// Error when a token lifetime does not match `^(\d+)([smhd])$`
    #[error("error-quizauth-config-5 Invalid token lifetime '{0}': expected <number><s|m|h|d>")]
    LifetimeParsingFailed(String),

    /// Error when boolean string cannot be parsed
    #[error(
        "error-quizauth-config-6 Failed to parse boolean '{0}': expected true/false/1/0/yes/no/on/off"
    )]
    BoolParsingFailed(String),

    /// Error when a credential is present but empty
    #[error("error-quizauth-config-7 {0} must not be empty")]
    EmptyCredential(String),

    /// Error when the provider base URL cannot be parsed
    #[error("error-quizauth-config-8 Invalid provider base URL '{0}': {1}")]
    ProviderBaseInvalid(String, url::ParseError),
}

/// Protocol errors raised while exchanging with the identity provider.
/// Always terminal to the login flow in progress.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Provider returned a non-success status for an exchange
    #[error("error-quizauth-protocol-1 Provider rejected {0} with status {1}")]
    ExchangeRejected(&'static str, u16),

    /// Provider response body could not be interpreted
    #[error("error-quizauth-protocol-2 Malformed provider response during {0}: {1}")]
    MalformedResponse(&'static str, String),

    /// Outbound request failed (timeout, connection, TLS)
    #[error("error-quizauth-protocol-3 Provider request {0} failed: {1}")]
    RequestFailed(&'static str, String),

    /// OAuth 2.0 state returned by the provider does not match the stored value
    #[error("error-quizauth-protocol-4 OAuth state mismatch")]
    StateMismatch,

    /// Provider identify response failed signature verification
    #[error("error-quizauth-protocol-5 Identify response verification failed: {0}")]
    IdentifyVerificationFailed(String),

    /// Provider reported an error instead of an authorization grant
    #[error("error-quizauth-protocol-6 Provider returned error: {0}")]
    ProviderDenied(String),
}

/// Transient flow state errors: missing, expired, or already consumed
/// login-in-flight cookies. Terminal to the flow.
#[derive(Debug, Error)]
pub enum TransientStateError {
    /// Required flow cookie is absent (expired or already consumed)
    #[error("error-quizauth-transient-1 Missing or consumed login state cookie '{0}'")]
    MissingCookie(&'static str),

    /// Flow cookie exists but does not deserialize
    #[error("error-quizauth-transient-2 Malformed login state cookie '{0}'")]
    MalformedCookie(&'static str),

    /// Required callback query parameter is absent
    #[error("error-quizauth-transient-3 Missing callback parameter '{0}'")]
    MissingParameter(&'static str),
}

/// Session token errors. Any verification failure means "not authenticated".
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signature, expiry, issuer, or audience check failed
    #[error("error-quizauth-token-1 Token verification failed: {0}")]
    VerificationFailed(String),

    /// Token verified but carries the wrong typ claim
    #[error("error-quizauth-token-2 Unexpected token type: expected '{0}', got '{1}'")]
    WrongType(&'static str, String),

    /// Token could not be signed
    #[error("error-quizauth-token-3 Token signing failed: {0}")]
    SigningFailed(String),
}

/// Database/storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Error when database connection fails
    #[error("error-quizauth-storage-1 Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Error when database operation fails
    #[error("error-quizauth-storage-2 Database error: {0}")]
    DatabaseError(String),

    /// Error when stored data does not deserialize
    #[error("error-quizauth-storage-3 Invalid data: {0}")]
    InvalidData(String),
}
