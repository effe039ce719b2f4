//! Core data types for the authentication subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default role set assigned to newly created users.
pub const DEFAULT_ROLES: &[&str] = &["user"];

/// An authenticated identity bound to one external Wikimedia account.
///
/// Exactly one row exists per distinct `wikimedia_id`; rows are created on
/// first successful callback and updated on every subsequent one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Opaque internal identifier (ULID)
    pub id: String,
    /// Display username, mirrored from the provider on each login
    pub username: String,
    /// Provider identity id; unique when present, None only before first login
    pub wikimedia_id: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// Role strings, defaults to `{"user"}`
    pub roles: Vec<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user on first login for a provider identity.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub wikimedia_id: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// When None the store assigns [`DEFAULT_ROLES`]
    pub roles: Option<Vec<String>>,
}

/// Persisted refresh token: a renewable credential bound to a user and the
/// client context it was issued to. Live until expired or deleted, no
/// intermediate states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub user_id: String,
    /// The signed refresh token string (unique)
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    /// Best-effort client IP from forwarding headers; never guessed
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Identity attributes fetched from the provider after a completed exchange.
/// Both the OAuth 1.0a identify response and the OAuth 2.0 profile endpoint
/// normalize into this shape.
#[derive(Debug, Clone)]
pub struct WikimediaIdentity {
    /// Central provider user id (`sub`)
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

/// Generate a new opaque internal user id.
pub fn generate_user_id() -> String {
    ulid::Ulid::new().to_string()
}
