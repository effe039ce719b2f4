//! PKCE challenge generation and state verification for the OAuth 2.0 flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Transient values generated at login time for one OAuth 2.0 authorization
/// attempt. `state` and `code_verifier` are stored client-side until the
/// callback; `code_challenge` is sent to the provider.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub state: String,
    pub code_verifier: String,
    pub code_challenge: String,
}

/// Generate a fresh state/verifier/challenge triple.
///
/// - `state`: 16 random bytes, hex-encoded
/// - `code_verifier`: 64 random bytes, hex-encoded (128 chars, within the
///   RFC 7636 43-128 character bound)
/// - `code_challenge`: `BASE64URL-NOPAD(SHA256(code_verifier))` (S256)
pub fn generate_challenge() -> PkceChallenge {
    let mut state_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut state_bytes);
    let mut verifier_bytes = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut verifier_bytes);

    let state = hex::encode(state_bytes);
    let code_verifier = hex::encode(verifier_bytes);
    let code_challenge = compute_challenge(&code_verifier);

    PkceChallenge {
        state,
        code_verifier,
        code_challenge,
    }
}

/// Compute the S256 challenge for a verifier.
pub fn compute_challenge(code_verifier: &str) -> String {
    let digest = Sha256::digest(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Exact comparison of the stored and returned `state` values. A mismatch is
/// a terminal authentication failure for the flow.
pub fn verify_state(expected: &str, received: &str) -> bool {
    !expected.is_empty() && expected == received
}
