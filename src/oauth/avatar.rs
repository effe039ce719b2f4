//! Deterministic avatar URLs derived from a user's email address.

use sha2::{Digest, Sha256};

/// Gravatar address for an email, using the SHA-256 hash form with an
/// identicon fallback. Same email in, same URL out.
pub fn avatar_url(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?d=identicon",
        hex::encode(digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_url_is_deterministic() {
        assert_eq!(avatar_url("fan@example.com"), avatar_url("fan@example.com"));
    }

    #[test]
    fn test_avatar_url_normalizes_case_and_whitespace() {
        assert_eq!(
            avatar_url("  Fan@Example.COM "),
            avatar_url("fan@example.com")
        );
    }

    #[test]
    fn test_avatar_url_shape() {
        let url = avatar_url("fan@example.com");
        assert!(url.starts_with("https://www.gravatar.com/avatar/"));
        assert!(url.ends_with("?d=identicon"));
        // SHA-256 hex digest is 64 chars
        let hash = url
            .trim_start_matches("https://www.gravatar.com/avatar/")
            .trim_end_matches("?d=identicon");
        assert_eq!(hash.len(), 64);
    }
}
