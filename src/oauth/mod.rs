//! OAuth protocol engines: request signing, PKCE, session tokens, and the
//! Wikimedia provider client.

pub mod avatar;
pub mod pkce;
pub mod provider;
pub mod signature;
pub mod tokens;
pub mod types;

pub use pkce::{PkceChallenge, generate_challenge, verify_state};
pub use provider::WikimediaClient;
pub use signature::{OAuth1Signer, TokenCredential};
pub use tokens::{TokenIssuer, TokenPair};
pub use types::{RefreshTokenRecord, User, WikimediaIdentity};
