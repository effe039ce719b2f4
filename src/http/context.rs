//! Application state shared across request handlers.

use std::sync::Arc;

use crate::config::Config;
use crate::oauth::{TokenIssuer, WikimediaClient};
use crate::storage::traits::AuthStorage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Selected storage backend for users and refresh tokens
    pub storage: Arc<dyn AuthStorage>,
    /// Session token signer/verifier
    pub tokens: Arc<TokenIssuer>,
    /// Outbound client for the Wikimedia identity provider
    pub wikimedia: Arc<WikimediaClient>,
}
