//! Wikimedia dual-OAuth authentication service library crate.
//!
//! Reconciles OAuth 1.0a (HMAC-SHA1 signed) and OAuth 2.0 (PKCE) Wikimedia
//! login flows into a single internal session model backed by interchangeable
//! storage backends.

pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
